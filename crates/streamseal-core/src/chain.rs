//! The processor chain.
//!
//! An ordered, mutable list of processors through which every event is
//! routed. Delivery is push-style: the chain hands the event to the first
//! processor; each processor decides whether to forward it onward via its
//! [`ChainContext`]. A processor that returns without forwarding consumes
//! the event.
//!
//! # Mutation contract
//!
//! - `insert_after_self` / `insert_before_terminal` performed while
//!   handling event N never affect delivery of event N to processors
//!   already past the mutation point.
//! - A processor inserted during event N first sees event N+1 - unless the
//!   inserting processor explicitly re-dispatches event N with
//!   [`ChainContext::redispatch`].
//! - A processor removing itself mid-call neither skips nor duplicates
//!   delivery to the remainder of the chain for the current event.
//! - The first processor failure marks the chain failed; a failed or
//!   finished chain rejects further use with
//!   [`SecurityError::ChainState`].

use std::sync::Arc;

use streamseal_xml::XmlEvent;

use crate::{context::SecurityContext, env::Environment, error::SecurityError};

/// A polymorphic event handler participating in a chain.
pub trait Processor {
    /// Short stable name for diagnostics.
    fn name(&self) -> &'static str;

    /// Handle one event. Forward it (possibly rewritten) with
    /// [`ChainContext::forward`] or consume it by returning without
    /// forwarding.
    fn handle_event(
        &mut self,
        event: XmlEvent,
        ctx: &mut ChainContext<'_>,
    ) -> Result<(), SecurityError>;

    /// Called once after the final event. Events emitted here flow only
    /// to processors after this one.
    fn finish(&mut self, ctx: &mut ChainContext<'_>) -> Result<(), SecurityError> {
        let _ = ctx;
        Ok(())
    }

    /// Hook invoked when the processor joins a running chain.
    fn on_inserted(&mut self) {}

    /// Hook invoked when the processor leaves the chain.
    fn on_removed(&mut self) {}
}

/// Whether a dispatch includes processors inserted during the current
/// top-level call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchMode {
    /// Normal forwarding: processors that joined during this event wait
    /// for the next one.
    SkipNew,
    /// Explicit re-dispatch: just-inserted processors participate.
    IncludeNew,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainState {
    Ready,
    Failed,
    Finished,
}

struct Entry {
    processor: Option<Box<dyn Processor>>,
    joined_seq: u64,
    removed: bool,
}

/// Ordered, mutable processor list with the delivery contract above.
pub struct ProcessorChain {
    entries: Vec<Entry>,
    security_context: SecurityContext,
    environment: Arc<dyn Environment>,
    seq: u64,
    state: ChainState,
}

impl ProcessorChain {
    /// An empty chain over the given context and environment.
    pub fn new(security_context: SecurityContext, environment: Arc<dyn Environment>) -> Self {
        Self { entries: Vec::new(), security_context, environment, seq: 0, state: ChainState::Ready }
    }

    /// Append a processor at the end of the chain. Setup-time only.
    pub fn append(&mut self, processor: Box<dyn Processor>) {
        self.entries.push(Entry { processor: Some(processor), joined_seq: 0, removed: false });
    }

    /// Route one event through the chain.
    pub fn process_event(&mut self, event: XmlEvent) -> Result<(), SecurityError> {
        self.ensure_ready()?;
        self.seq += 1;
        let result = self.dispatch(0, event, DispatchMode::SkipNew);
        self.settle(result)
    }

    /// Run every processor's `finish` in chain order.
    pub fn finish(&mut self) -> Result<(), SecurityError> {
        self.ensure_ready()?;
        self.seq += 1;

        let mut index = 0;
        while index < self.entries.len() {
            if self.entries[index].removed || self.entries[index].processor.is_none() {
                index += 1;
                continue;
            }
            // INVARIANT: checked is_some() above; entries are only taken
            // while their own handler frame is on the stack, and no such
            // frame exists for `index` here.
            #[allow(clippy::expect_used)]
            let mut processor =
                self.entries[index].processor.take().expect("invariant: presence checked above");

            let mut ctx =
                ChainContext { chain: self, position: index, mode: DispatchMode::IncludeNew };
            let result = processor.finish(&mut ctx);
            self.restore(index, processor);

            if result.is_err() {
                self.state = ChainState::Failed;
                return result;
            }
            index += 1;
        }

        self.compact();
        self.state = ChainState::Finished;
        Ok(())
    }

    /// The per-message security context.
    pub fn security_context(&self) -> &SecurityContext {
        &self.security_context
    }

    /// Mutable access to the per-message security context.
    pub fn security_context_mut(&mut self) -> &mut SecurityContext {
        &mut self.security_context
    }

    /// Drain the observation log, leaving the chain in place.
    pub fn take_events(&mut self) -> Vec<crate::observe::SecurityEvent> {
        std::mem::take(&mut self.security_context).into_events()
    }

    fn ensure_ready(&self) -> Result<(), SecurityError> {
        match self.state {
            ChainState::Ready => Ok(()),
            ChainState::Failed => {
                Err(SecurityError::chain_state("chain has failed and must not be reused"))
            },
            ChainState::Finished => {
                Err(SecurityError::chain_state("chain has finished and must not be reused"))
            },
        }
    }

    fn settle(&mut self, result: Result<(), SecurityError>) -> Result<(), SecurityError> {
        if result.is_err() {
            self.state = ChainState::Failed;
        } else {
            self.compact();
        }
        result
    }

    /// Deliver `event` to the first eligible processor at or after `from`.
    ///
    /// Further delivery happens inside that processor's handler when it
    /// forwards; an event that reaches the end of the list is dropped
    /// (the terminal sink normally consumes it first).
    fn dispatch(
        &mut self,
        from: usize,
        event: XmlEvent,
        mode: DispatchMode,
    ) -> Result<(), SecurityError> {
        let current_seq = self.seq;
        let mut index = from;
        while index < self.entries.len() {
            let eligible = {
                let entry = &self.entries[index];
                !entry.removed
                    && entry.processor.is_some()
                    && (mode == DispatchMode::IncludeNew || entry.joined_seq < current_seq)
            };
            if !eligible {
                index += 1;
                continue;
            }

            // INVARIANT: presence checked in `eligible` above.
            #[allow(clippy::expect_used)]
            let mut processor =
                self.entries[index].processor.take().expect("invariant: presence checked above");

            let mut ctx = ChainContext { chain: self, position: index, mode };
            let result = processor.handle_event(event, &mut ctx);
            self.restore(index, processor);
            return result;
        }
        Ok(())
    }

    /// Put a processor back into its slot, or drop it if it removed
    /// itself during the call.
    fn restore(&mut self, index: usize, mut processor: Box<dyn Processor>) {
        if self.entries[index].removed {
            tracing::debug!(processor = processor.name(), "processor removed from chain");
            processor.on_removed();
        } else {
            self.entries[index].processor = Some(processor);
        }
    }

    fn compact(&mut self) {
        self.entries.retain(|entry| !entry.removed);
    }
}

impl std::fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self
            .entries
            .iter()
            .filter(|e| !e.removed)
            .filter_map(|e| e.processor.as_ref().map(|p| p.name()))
            .collect();
        f.debug_struct("ProcessorChain")
            .field("processors", &names)
            .field("seq", &self.seq)
            .field("state", &self.state)
            .finish()
    }
}

/// A processor's view of the chain while it handles an event.
pub struct ChainContext<'a> {
    chain: &'a mut ProcessorChain,
    position: usize,
    mode: DispatchMode,
}

impl ChainContext<'_> {
    /// Deliver `event` to the remainder of the chain, in the order that
    /// held when the current top-level call started. Processors inserted
    /// during this call do not see it.
    pub fn forward(&mut self, event: XmlEvent) -> Result<(), SecurityError> {
        self.chain.dispatch(self.position + 1, event, self.mode)
    }

    /// Deliver `event` to the remainder of the chain including processors
    /// inserted during this call - the explicit way to hand the current
    /// event to a just-inserted sub-processor.
    pub fn redispatch(&mut self, event: XmlEvent) -> Result<(), SecurityError> {
        self.chain.dispatch(self.position + 1, event, DispatchMode::IncludeNew)
    }

    /// Insert a processor immediately after the current one.
    pub fn insert_after_self(&mut self, mut processor: Box<dyn Processor>) {
        tracing::debug!(processor = processor.name(), "inserting processor after current");
        processor.on_inserted();
        self.chain.entries.insert(
            self.position + 1,
            Entry { processor: Some(processor), joined_seq: self.chain.seq, removed: false },
        );
    }

    /// Insert a processor just before the terminal sink (the last entry).
    pub fn insert_before_terminal(&mut self, mut processor: Box<dyn Processor>) {
        tracing::debug!(processor = processor.name(), "inserting processor before terminal");
        processor.on_inserted();
        let at = self.chain.entries.len().saturating_sub(1).max(self.position + 1);
        self.chain.entries.insert(
            at,
            Entry { processor: Some(processor), joined_seq: self.chain.seq, removed: false },
        );
    }

    /// Remove the current processor from the chain. Safe mid-call: the
    /// current event still reaches the rest of the chain exactly once.
    pub fn remove_self(&mut self) {
        self.chain.entries[self.position].removed = true;
    }

    /// The per-message security context.
    pub fn security_context(&self) -> &SecurityContext {
        &self.chain.security_context
    }

    /// Mutable access to the per-message security context.
    pub fn security_context_mut(&mut self) -> &mut SecurityContext {
        &mut self.chain.security_context
    }

    /// The engine environment (clock and entropy).
    pub fn environment(&self) -> &dyn Environment {
        &*self.chain.environment
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::RefCell,
        rc::Rc,
        sync::Arc,
    };

    use super::*;
    use crate::env::SystemEnvironment;

    /// Records every event text it sees into a shared log, tagged with
    /// its own label, then forwards.
    struct Recorder {
        label: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Processor for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn handle_event(
            &mut self,
            event: XmlEvent,
            ctx: &mut ChainContext<'_>,
        ) -> Result<(), SecurityError> {
            if let Some(text) = event.as_characters() {
                self.log.borrow_mut().push(format!("{}:{}", self.label, text));
            }
            ctx.forward(event)
        }
    }

    /// Consumes every event (terminal stand-in).
    struct Sink;

    impl Processor for Sink {
        fn name(&self) -> &'static str {
            "sink"
        }

        fn handle_event(
            &mut self,
            _event: XmlEvent,
            _ctx: &mut ChainContext<'_>,
        ) -> Result<(), SecurityError> {
            Ok(())
        }
    }

    /// Inserts a Recorder after itself on the first event, optionally
    /// re-dispatching that same event.
    struct Inserter {
        log: Rc<RefCell<Vec<String>>>,
        redispatch: bool,
        inserted: bool,
    }

    impl Processor for Inserter {
        fn name(&self) -> &'static str {
            "inserter"
        }

        fn handle_event(
            &mut self,
            event: XmlEvent,
            ctx: &mut ChainContext<'_>,
        ) -> Result<(), SecurityError> {
            if !self.inserted {
                self.inserted = true;
                ctx.insert_after_self(Box::new(Recorder {
                    label: "new",
                    log: Rc::clone(&self.log),
                }));
                if self.redispatch {
                    return ctx.redispatch(event);
                }
            }
            ctx.forward(event)
        }
    }

    /// Removes itself while handling its first event, after logging it.
    struct SelfRemover {
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Processor for SelfRemover {
        fn name(&self) -> &'static str {
            "self-remover"
        }

        fn handle_event(
            &mut self,
            event: XmlEvent,
            ctx: &mut ChainContext<'_>,
        ) -> Result<(), SecurityError> {
            if let Some(text) = event.as_characters() {
                self.log.borrow_mut().push(format!("remover:{text}"));
            }
            ctx.remove_self();
            ctx.forward(event)
        }
    }

    struct Failing;

    impl Processor for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn handle_event(
            &mut self,
            _event: XmlEvent,
            _ctx: &mut ChainContext<'_>,
        ) -> Result<(), SecurityError> {
            Err(SecurityError::invalid("boom"))
        }
    }

    fn chain() -> ProcessorChain {
        ProcessorChain::new(SecurityContext::new(), Arc::new(SystemEnvironment))
    }

    fn text(t: &str) -> XmlEvent {
        XmlEvent::text(t)
    }

    #[test]
    fn events_flow_in_chain_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut chain = chain();
        chain.append(Box::new(Recorder { label: "a", log: Rc::clone(&log) }));
        chain.append(Box::new(Recorder { label: "b", log: Rc::clone(&log) }));
        chain.append(Box::new(Sink));

        chain.process_event(text("1")).unwrap();

        assert_eq!(*log.borrow(), vec!["a:1".to_string(), "b:1".to_string()]);
    }

    #[test]
    fn inserted_processor_first_sees_the_next_event() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut chain = chain();
        chain.append(Box::new(Inserter { log: Rc::clone(&log), redispatch: false, inserted: false }));
        chain.append(Box::new(Sink));

        chain.process_event(text("1")).unwrap();
        chain.process_event(text("2")).unwrap();

        // "new" never observes event 1.
        assert_eq!(*log.borrow(), vec!["new:2".to_string()]);
    }

    #[test]
    fn redispatch_hands_current_event_to_inserted_processor() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut chain = chain();
        chain.append(Box::new(Inserter { log: Rc::clone(&log), redispatch: true, inserted: false }));
        chain.append(Box::new(Sink));

        chain.process_event(text("1")).unwrap();

        assert_eq!(*log.borrow(), vec!["new:1".to_string()]);
    }

    #[test]
    fn self_removal_neither_skips_nor_duplicates_delivery() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut chain = chain();
        chain.append(Box::new(SelfRemover { log: Rc::clone(&log) }));
        chain.append(Box::new(Recorder { label: "after", log: Rc::clone(&log) }));
        chain.append(Box::new(Sink));

        chain.process_event(text("1")).unwrap();
        chain.process_event(text("2")).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["remover:1".to_string(), "after:1".to_string(), "after:2".to_string()]
        );
    }

    #[test]
    fn failed_chain_rejects_reuse() {
        let mut chain = chain();
        chain.append(Box::new(Failing));

        assert!(chain.process_event(text("1")).is_err());

        let reuse = chain.process_event(text("2"));
        assert!(matches!(reuse, Err(SecurityError::ChainState { .. })));

        let finish = chain.finish();
        assert!(matches!(finish, Err(SecurityError::ChainState { .. })));
    }

    #[test]
    fn finished_chain_rejects_reuse() {
        let mut chain = chain();
        chain.append(Box::new(Sink));

        chain.finish().unwrap();

        let reuse = chain.process_event(text("1"));
        assert!(matches!(reuse, Err(SecurityError::ChainState { .. })));
    }

    #[test]
    fn finish_events_flow_only_downstream() {
        /// Emits one text event during finish.
        struct FinishEmitter;

        impl Processor for FinishEmitter {
            fn name(&self) -> &'static str {
                "finish-emitter"
            }

            fn handle_event(
                &mut self,
                event: XmlEvent,
                ctx: &mut ChainContext<'_>,
            ) -> Result<(), SecurityError> {
                ctx.forward(event)
            }

            fn finish(&mut self, ctx: &mut ChainContext<'_>) -> Result<(), SecurityError> {
                ctx.forward(XmlEvent::text("late"))
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut chain = chain();
        chain.append(Box::new(Recorder { label: "up", log: Rc::clone(&log) }));
        chain.append(Box::new(FinishEmitter));
        chain.append(Box::new(Recorder { label: "down", log: Rc::clone(&log) }));
        chain.append(Box::new(Sink));

        chain.finish().unwrap();

        // The upstream recorder never sees the late event.
        assert_eq!(*log.borrow(), vec!["down:late".to_string()]);
    }

    #[test]
    fn insert_before_terminal_lands_ahead_of_the_sink() {
        /// Inserts a Recorder before the terminal on its first event.
        struct TerminalInserter {
            log: Rc<RefCell<Vec<String>>>,
            inserted: bool,
        }

        impl Processor for TerminalInserter {
            fn name(&self) -> &'static str {
                "terminal-inserter"
            }

            fn handle_event(
                &mut self,
                event: XmlEvent,
                ctx: &mut ChainContext<'_>,
            ) -> Result<(), SecurityError> {
                if !self.inserted {
                    self.inserted = true;
                    ctx.insert_before_terminal(Box::new(Recorder {
                        label: "pre-sink",
                        log: Rc::clone(&self.log),
                    }));
                }
                ctx.forward(event)
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut chain = chain();
        chain.append(Box::new(TerminalInserter { log: Rc::clone(&log), inserted: false }));
        chain.append(Box::new(Recorder { label: "mid", log: Rc::clone(&log) }));
        chain.append(Box::new(Sink));

        chain.process_event(text("1")).unwrap();
        chain.process_event(text("2")).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                "mid:1".to_string(),
                "mid:2".to_string(),
                "pre-sink:2".to_string(),
            ]
        );
    }
}
