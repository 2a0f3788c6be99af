//! Multi-call batching for the account `__execute__` entrypoint
//!
//! A batch of calls is flattened into one calldata blob plus a descriptor
//! table so the account contract can dispatch every sub-call atomically and
//! in the order given.

use crate::error::PublisherResult;
use crate::felt::{selector_from_name, Felt};

/// A single contract invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    to: Felt,
    entrypoint: String,
    args: Vec<Felt>,
}

impl Call {
    pub fn new(to: Felt, entrypoint: impl Into<String>, args: Vec<Felt>) -> Self {
        Self {
            to,
            entrypoint: entrypoint.into(),
            args,
        }
    }

    pub fn to(&self) -> Felt {
        self.to
    }

    pub fn entrypoint(&self) -> &str {
        &self.entrypoint
    }

    pub fn args(&self) -> &[Felt] {
        &self.args
    }
}

/// Ordered calls executed as one transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    calls: Vec<Call>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, call: Call) {
        self.calls.push(call);
    }

    pub fn with_call(mut self, call: Call) -> Self {
        self.calls.push(call);
        self
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl From<Vec<Call>> for Batch {
    fn from(calls: Vec<Call>) -> Self {
        Self { calls }
    }
}

impl FromIterator<Call> for Batch {
    fn from_iter<I: IntoIterator<Item = Call>>(iter: I) -> Self {
        Self {
            calls: iter.into_iter().collect(),
        }
    }
}

/// Entry of the call table; offsets and lengths count felts in `calldata`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallDescriptor {
    pub to: Felt,
    pub selector: Felt,
    pub data_offset: usize,
    pub data_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    pub call_array: Vec<CallDescriptor>,
    pub calldata: Vec<Felt>,
}

impl EncodedBatch {
    /// `__execute__` arguments:
    /// `[n_calls, (to, selector, offset, len)*, calldata_len, calldata*, nonce]`
    pub fn execute_calldata(&self, nonce: u64) -> Vec<Felt> {
        let mut out = Vec::with_capacity(3 + self.call_array.len() * 4 + self.calldata.len());

        out.push(Felt::from(self.call_array.len()));
        for descriptor in &self.call_array {
            out.push(descriptor.to);
            out.push(descriptor.selector);
            out.push(Felt::from(descriptor.data_offset));
            out.push(Felt::from(descriptor.data_len));
        }

        out.push(Felt::from(self.calldata.len()));
        out.extend_from_slice(&self.calldata);
        out.push(Felt::from(nonce));

        out
    }
}

/// Stateless encoder for call batches
#[derive(Debug, Clone, Copy, Default)]
pub struct CallBatcher;

impl CallBatcher {
    /// Fails only if an entrypoint name is not ASCII
    pub fn encode(&self, batch: &Batch) -> PublisherResult<EncodedBatch> {
        let mut call_array = Vec::with_capacity(batch.len());
        let mut calldata = Vec::new();

        for call in batch.calls() {
            call_array.push(CallDescriptor {
                to: call.to,
                selector: selector_from_name(&call.entrypoint)?,
                data_offset: calldata.len(),
                data_len: call.args.len(),
            });
            calldata.extend_from_slice(&call.args);
        }

        Ok(EncodedBatch {
            call_array,
            calldata,
        })
    }
}
