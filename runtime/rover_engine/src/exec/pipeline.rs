//! Pipeline operators.
//!
//! Map, filter and peek wrap their source lazily: the result is a plain
//! atomic value carrying the adapter chain in its metadata pool, and a
//! downstream operator takes the chain over (pipelines are single-pass
//! and non-restartable). The element functions need the engine to invoke
//! them, which is why the adapters live here rather than in the value
//! crate's iterator bridge.
//!
//! Consume, collect, reduce and the foreach terminal force full
//! traversal, observing pause/stop between elements.

use parking_lot::Mutex;

use rover_ir::{PipelineOp, Position};
use rover_value::{
    errors, RuntimeError, RuntimeValue, Signal, SignalResult, ValueKind, ValueStream,
};

use super::Engine;
use crate::program::{FunctionId, InstId};

/// A lazy adapter chain over a source stream.
pub(crate) enum PipeChain {
    Source(ValueStream),
    Mapped {
        source: Box<PipeChain>,
        func: FunctionId,
    },
    Filtered {
        source: Box<PipeChain>,
        func: FunctionId,
    },
    Peeked {
        source: Box<PipeChain>,
        func: FunctionId,
    },
}

/// Metadata extension carrying an un-consumed pipeline chain.
pub(crate) struct PipeExtension {
    chain: Mutex<Option<PipeChain>>,
}

impl PipeExtension {
    fn new(chain: PipeChain) -> Self {
        PipeExtension {
            chain: Mutex::new(Some(chain)),
        }
    }

    fn take(&self) -> Option<PipeChain> {
        self.chain.lock().take()
    }
}

impl Engine<'_> {
    pub(crate) fn exec_pipeline(
        &mut self,
        op: PipelineOp,
        source: InstId,
        func: FunctionId,
        seed: Option<InstId>,
        pos: Position,
    ) -> SignalResult {
        let src = self.value_of(source)?;
        let chain = self.open_chain(&src)?;
        match op {
            PipelineOp::Map => Self::defer(PipeChain::Mapped {
                source: Box::new(chain),
                func,
            }),
            PipelineOp::Filter => Self::defer(PipeChain::Filtered {
                source: Box::new(chain),
                func,
            }),
            PipelineOp::Peek => Self::defer(PipeChain::Peeked {
                source: Box::new(chain),
                func,
            }),

            PipelineOp::Collect => {
                let mut chain = chain;
                let mut items = Vec::new();
                while let Some(value) = self.drain_step(&mut chain, pos)? {
                    items.push(value);
                }
                Ok(Signal::resume_with(RuntimeValue::list(items)))
            }
            PipelineOp::Consume => {
                let mut chain = chain;
                while self.drain_step(&mut chain, pos)?.is_some() {}
                Ok(Signal::resume_with(RuntimeValue::null()))
            }
            PipelineOp::ForEach => {
                let mut chain = chain;
                while let Some(value) = self.drain_step(&mut chain, pos)? {
                    self.call_function(func, vec![value], pos)?;
                }
                Ok(Signal::resume_with(RuntimeValue::null()))
            }
            PipelineOp::Reduce => {
                let seed = seed
                    .ok_or_else(|| errors::runtime_error("reduce compiled without a seed"))?;
                // The seed is evaluated once, before the first element.
                let mut acc = self.value_of(seed)?;
                let mut chain = chain;
                while let Some(value) = self.drain_step(&mut chain, pos)? {
                    acc = self.call_function(func, vec![acc, value], pos)?;
                }
                Ok(Signal::resume_with(acc))
            }
        }
    }

    /// Package a lazy chain as a value for the next operator downstream.
    fn defer(chain: PipeChain) -> SignalResult {
        let handle = RuntimeValue::text("[pipeline]");
        handle.store_metadata(PipeExtension::new(chain))?;
        Ok(Signal::resume_with(handle))
    }

    /// Open a chain over a source: an upstream pipeline value hands over
    /// its chain, anything else goes through the iterator bridge.
    fn open_chain(&mut self, source: &RuntimeValue) -> Result<PipeChain, RuntimeError> {
        if source.kind()? == ValueKind::Atomic {
            if let Some(ext) = source.get_metadata::<PipeExtension>()? {
                return ext
                    .take()
                    .ok_or_else(|| errors::runtime_error("pipeline already consumed"));
            }
        }
        Ok(PipeChain::Source(ValueStream::over(source)?))
    }

    /// One terminal-drain step with a suspension-point check.
    fn drain_step(
        &mut self,
        chain: &mut PipeChain,
        pos: Position,
    ) -> Result<Option<RuntimeValue>, RuntimeError> {
        self.check_control()?;
        self.chain_next(chain, pos)
    }

    fn chain_next(
        &mut self,
        chain: &mut PipeChain,
        pos: Position,
    ) -> Result<Option<RuntimeValue>, RuntimeError> {
        match chain {
            PipeChain::Source(stream) => stream.next(),
            PipeChain::Mapped { source, func } => {
                let func = *func;
                match self.chain_next(source, pos)? {
                    Some(value) => Ok(Some(self.call_function(func, vec![value], pos)?)),
                    None => Ok(None),
                }
            }
            PipeChain::Filtered { source, func } => {
                let func = *func;
                loop {
                    match self.chain_next(source, pos)? {
                        Some(value) => {
                            let keep = self
                                .call_function(func, vec![value.clone()], pos)?
                                .as_boolean()?;
                            if keep {
                                return Ok(Some(value));
                            }
                        }
                        None => return Ok(None),
                    }
                }
            }
            PipeChain::Peeked { source, func } => {
                let func = *func;
                match self.chain_next(source, pos)? {
                    Some(value) => {
                        self.call_function(func, vec![value.clone()], pos)?;
                        Ok(Some(value))
                    }
                    None => Ok(None),
                }
            }
        }
    }
}
