//! Samples and the channel collection tasks emit them into.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;

use crate::desc::Desc;
use crate::error::{MetricError, MetricResult};

/// One observed value of a family, with its label values in descriptor order.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub desc: Arc<Desc>,
    pub label_values: Vec<String>,
    pub value: f64,
}

impl Sample {
    pub fn new(desc: &Arc<Desc>, value: f64, label_values: Vec<String>) -> MetricResult<Self> {
        if label_values.len() != desc.label_names.len() {
            return Err(MetricError::LabelCardinality {
                name: desc.fq_name.clone(),
                expected: desc.label_names.len(),
                got: label_values.len(),
            });
        }
        Ok(Self {
            desc: Arc::clone(desc),
            label_values,
            value,
        })
    }

    pub fn name(&self) -> &str {
        &self.desc.fq_name
    }

    /// Value of the label called `name`, if the family has one.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .label_names
            .iter()
            .position(|l| l == name)
            .map(|i| self.label_values[i].as_str())
    }
}

/// Send and commit counters shared by a sink and its buffer.
#[derive(Debug, Default)]
struct Marks {
    sent: AtomicUsize,
    committed: AtomicUsize,
}

/// Sending half handed to a collection task.
#[derive(Debug, Clone)]
pub struct SampleSink {
    tx: mpsc::UnboundedSender<Sample>,
    marks: Arc<Marks>,
}

/// Receiving half; drained once every sink clone has been dropped.
#[derive(Debug)]
pub struct SampleBuffer {
    rx: mpsc::UnboundedReceiver<Sample>,
    marks: Arc<Marks>,
}

impl SampleSink {
    pub fn channel() -> (SampleSink, SampleBuffer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let marks = Arc::new(Marks::default());
        (
            SampleSink {
                tx,
                marks: Arc::clone(&marks),
            },
            SampleBuffer { rx, marks },
        )
    }

    /// Build and send a sample.
    pub fn emit(&self, desc: &Arc<Desc>, value: f64, label_values: Vec<String>) -> MetricResult<()> {
        self.send(Sample::new(desc, value, label_values)?)
    }

    pub fn send(&self, sample: Sample) -> MetricResult<()> {
        self.tx.send(sample).map_err(|_| MetricError::SinkClosed)?;
        self.marks.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Everything sent so far is kept even if the task later fails.
    pub fn commit(&self) {
        let sent = self.marks.sent.load(Ordering::SeqCst);
        self.marks.committed.store(sent, Ordering::SeqCst);
    }
}

impl SampleBuffer {
    /// Everything sent so far, in send order.
    pub fn drain(&mut self) -> Vec<Sample> {
        let mut samples = Vec::new();
        while let Ok(sample) = self.rx.try_recv() {
            samples.push(sample);
        }
        samples
    }

    /// Only the samples sent before the last [`SampleSink::commit`].
    pub fn drain_committed(&mut self) -> Vec<Sample> {
        let mut samples = self.drain();
        samples.truncate(self.marks.committed.load(Ordering::SeqCst));
        samples
    }
}
