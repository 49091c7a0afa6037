//! Instance version numbers.

use std::fmt;

use crate::error::VersionParseError;

/// `major.minor` of an Oracle release. "19.3.0.0.0" reads as 19.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    /// First release with multitenant containers.
    pub const MULTITENANT: Version = Version::new(12, 0);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse the first two dot-separated components; a missing minor is 0.
    pub fn parse(s: &str) -> Result<Self, VersionParseError> {
        let err = || VersionParseError(s.to_string());
        let mut parts = s.trim().split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(err)?;
        let minor = match parts.next() {
            Some(p) => p.parse::<u32>().map_err(|_| err())?,
            None => 0,
        };
        Ok(Self { major, minor })
    }

    pub fn is_multitenant(&self) -> bool {
        *self >= Self::MULTITENANT
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_two_components() {
        assert_eq!(Version::parse("11.2.0.4.0").unwrap(), Version::new(11, 2));
        assert_eq!(Version::parse("19.3.0.0.0").unwrap(), Version::new(19, 3));
        assert_eq!(Version::parse("12").unwrap(), Version::new(12, 0));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("abc").is_err());
        assert!(Version::parse("19.x.1").is_err());
    }

    #[test]
    fn orders_by_major_then_minor() {
        assert!(Version::new(11, 2) < Version::new(12, 0));
        assert!(Version::new(12, 1) > Version::new(12, 0));
        assert!(!Version::new(11, 2).is_multitenant());
        assert!(Version::new(19, 3).is_multitenant());
        assert_eq!(Version::new(10, 2).to_string(), "10.2");
    }
}
