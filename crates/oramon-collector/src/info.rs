//! Target discovery: what are we connected to right now.

use oramon_db::{DbClient, QueryContext, Row};
use tracing::info;

use crate::error::{CollectError, CollectResult};
use crate::version::Version;

pub(crate) const INSTANCE_SQL: &str = "select to_char(instance_number), instance_name, host_name, version, status, \
parallel, to_char(thread#), archiver, to_char(startup_time, 'yyyy-mm-dd hh24:mi:ss') as startup_time, \
(sysdate - startup_time) * 86400 as uptime, instance_role, database_status \
from v$instance";

pub(crate) const DATABASE_SQL: &str = "select to_char(dbid), name, db_unique_name, \
to_char(created, 'yyyy-mm-dd hh24:mi:ss') as created, log_mode, \
open_mode, protection_mode, database_role, platform_name \
from v$database";

pub(crate) const TENANT_SQL: &str =
    "select sys_context('userenv', 'con_name'), sys_context('userenv', 'con_id') from dual";

/// Row of `v$instance`.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceInfo {
    pub instance_number: String,
    pub instance_name: String,
    pub host_name: String,
    pub version: String,
    pub status: String,
    pub parallel: String,
    pub thread: String,
    pub archiver: String,
    pub startup_time: String,
    /// Seconds since instance startup.
    pub uptime: f64,
    pub instance_role: String,
    pub database_status: String,
    pub version_num: Version,
}

/// Row of `v$database`.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseInfo {
    pub dbid: String,
    pub db_name: String,
    pub db_unique_name: String,
    pub created: String,
    pub log_mode: String,
    pub open_mode: String,
    pub protection_mode: String,
    pub database_role: String,
    pub platform_name: String,
}

/// Container the session is attached to. Pre-12 databases report id "0"
/// and an empty name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantInfo {
    pub con_name: String,
    pub con_id: String,
}

impl Default for TenantInfo {
    fn default() -> Self {
        Self {
            con_name: String::new(),
            con_id: "0".to_string(),
        }
    }
}

/// Everything a collection task knows about its target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetInfo {
    pub instance: InstanceInfo,
    pub database: DatabaseInfo,
    pub tenant: TenantInfo,
    /// Set on passes over a tenant; root-only tasks skip these.
    pub tenant_scoped: bool,
}

impl TargetInfo {
    pub fn version(&self) -> Version {
        self.instance.version_num
    }

    pub fn is_multitenant(&self) -> bool {
        self.version().is_multitenant()
    }

    /// Connected to the root container of a multitenant database.
    pub fn is_container_root(&self) -> bool {
        self.is_multitenant() && self.tenant.con_id == "1"
    }

    /// Owned `con_name` label value.
    pub fn con_name(&self) -> String {
        self.tenant.con_name.clone()
    }
}

/// Read instance, database and container metadata over the current
/// connection.
pub async fn discover(client: &DbClient, ctx: &QueryContext) -> CollectResult<TargetInfo> {
    let rows = client.fetch_rows(ctx, INSTANCE_SQL, &[]).await?;
    let instance = instance_from_row(rows.first().ok_or(CollectError::NoRows("v$instance"))?)?;

    let rows = client.fetch_rows(ctx, DATABASE_SQL, &[]).await?;
    let database = database_from_row(rows.first().ok_or(CollectError::NoRows("v$database"))?)?;

    let tenant = if instance.version_num.is_multitenant() {
        let rows = client.fetch_rows(ctx, TENANT_SQL, &[]).await?;
        let row = rows.first().ok_or(CollectError::NoRows("userenv"))?;
        TenantInfo {
            con_name: row.text(0)?.to_string(),
            con_id: row.label(1)?,
        }
    } else {
        TenantInfo::default()
    };

    info!(
        version = %instance.version,
        dbid = %database.dbid,
        instance_name = %instance.instance_name,
        db_unique_name = %database.db_unique_name,
        con_name = %tenant.con_name,
        database_role = %database.database_role,
        "discovered target"
    );

    Ok(TargetInfo {
        instance,
        database,
        tenant,
        tenant_scoped: false,
    })
}

fn instance_from_row(r: &Row) -> CollectResult<InstanceInfo> {
    let version = r.text(3)?.to_string();
    let version_num = Version::parse(&version)?;
    Ok(InstanceInfo {
        instance_number: r.label(0)?,
        instance_name: r.text(1)?.to_string(),
        host_name: r.text(2)?.to_string(),
        version,
        status: r.text(4)?.to_string(),
        parallel: r.text(5)?.to_string(),
        thread: r.label(6)?,
        archiver: r.text(7)?.to_string(),
        startup_time: r.label(8)?,
        uptime: r.number(9)?,
        instance_role: r.text(10)?.to_string(),
        database_status: r.text(11)?.to_string(),
        version_num,
    })
}

fn database_from_row(r: &Row) -> CollectResult<DatabaseInfo> {
    Ok(DatabaseInfo {
        dbid: r.label(0)?,
        db_name: r.text(1)?.to_string(),
        db_unique_name: r.text(2)?.to_string(),
        created: r.label(3)?,
        log_mode: r.text(4)?.to_string(),
        open_mode: r.text(5)?.to_string(),
        protection_mode: r.text(6)?.to_string(),
        database_role: r.text(7)?.to_string(),
        platform_name: r.text(8)?.to_string(),
    })
}
