//! Ordered pass pipeline and the protocol layers use to extend it.
//!
//! The base language defines five anchor passes. A layer adds a pass by
//! naming an anchor and a side; all edits of a stack are collected at
//! bootstrap and resolved once into a fixed sequence.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::ast::Node;
use crate::context::PassContext;
use crate::delegate::DelegateOp;
use crate::error::CoreError;
use crate::printer;
use crate::visit::visit;

pub const BUILD_TYPES: &str = "build-types";
pub const DISAMBIGUATE: &str = "disambiguate";
pub const BUILD_SIGNATURES: &str = "build-signatures";
pub const TYPE_CHECK: &str = "type-check";
pub const OUTPUT: &str = "output";

/// A unit moving through the pipeline.
#[derive(Debug, Clone)]
pub struct Job {
    pub ast: Node,
    /// Rendered text, once the output pass has run.
    pub output: Option<String>,
}

impl Job {
    pub fn new(ast: Node) -> Self {
        Job { ast, output: None }
    }
}

pub trait Pass: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;

    fn run(&self, job: &mut Job, cx: &mut PassContext<'_>) -> Result<(), CoreError>;

    /// Whether the pass still runs on a unit that already has errors.
    fn runs_on_failed(&self) -> bool {
        false
    }
}

/// Runs one delegate operation over the whole tree. Carries no language
/// logic of its own.
#[derive(Debug, Clone)]
pub struct VisitorPass {
    id: String,
    op: DelegateOp,
}

impl VisitorPass {
    pub fn new(id: impl Into<String>, op: DelegateOp) -> Self {
        VisitorPass { id: id.into(), op }
    }
}

impl Pass for VisitorPass {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&self, job: &mut Job, cx: &mut PassContext<'_>) -> Result<(), CoreError> {
        job.ast = visit(self.op, &job.ast, cx)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputPass;

impl Pass for OutputPass {
    fn id(&self) -> &str {
        OUTPUT
    }

    fn run(&self, job: &mut Job, _cx: &mut PassContext<'_>) -> Result<(), CoreError> {
        job.output = Some(printer::render(&job.ast));
        Ok(())
    }
}

/// The base language's passes, in order.
pub fn base_passes() -> Vec<Arc<dyn Pass>> {
    vec![
        Arc::new(VisitorPass::new(BUILD_TYPES, DelegateOp::BuildTypes)),
        Arc::new(VisitorPass::new(DISAMBIGUATE, DelegateOp::Disambiguate)),
        Arc::new(VisitorPass::new(BUILD_SIGNATURES, DelegateOp::BuildSignatures)),
        Arc::new(VisitorPass::new(TYPE_CHECK, DelegateOp::TypeCheck)),
        Arc::new(OutputPass),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Placement {
    Before(String),
    After(String),
}

impl Placement {
    fn anchor(&self) -> &str {
        match self {
            Placement::Before(anchor) | Placement::After(anchor) => anchor,
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Before(anchor) => write!(f, "before `{anchor}`"),
            Placement::After(anchor) => write!(f, "after `{anchor}`"),
        }
    }
}

/// "Insert `pass` immediately before/after `anchor`", contributed by `layer`.
#[derive(Debug, Clone)]
pub struct PassEdit {
    pub layer: String,
    pub placement: Placement,
    pub pass: Arc<dyn Pass>,
}

impl PassEdit {
    pub fn before(layer: &str, anchor: &str, pass: Arc<dyn Pass>) -> Self {
        PassEdit {
            layer: layer.to_string(),
            placement: Placement::Before(anchor.to_string()),
            pass,
        }
    }

    pub fn after(layer: &str, anchor: &str, pass: Arc<dyn Pass>) -> Self {
        PassEdit {
            layer: layer.to_string(),
            placement: Placement::After(anchor.to_string()),
            pass,
        }
    }
}

/// The resolved pass sequence of one bootstrap.
#[derive(Debug, Clone)]
pub struct Pipeline {
    passes: Vec<Arc<dyn Pass>>,
}

impl Pipeline {
    /// Resolve `edits` against the anchors of `base`.
    ///
    /// Every slot (anchor plus side) holds at most one inserted pass, so the
    /// result does not depend on the order edits were registered in.
    pub fn resolve(base: Vec<Arc<dyn Pass>>, edits: Vec<PassEdit>) -> Result<Self, CoreError> {
        let anchors: HashSet<&str> = base.iter().map(|pass| pass.id()).collect();
        let mut slots: BTreeMap<Placement, PassEdit> = BTreeMap::new();
        for edit in edits {
            if !anchors.contains(edit.placement.anchor()) {
                return Err(CoreError::MissingAnchor {
                    pass: edit.pass.id().to_string(),
                    anchor: edit.placement.anchor().to_string(),
                });
            }
            if let Some(existing) = slots.get(&edit.placement) {
                return Err(CoreError::DuplicateAnchor {
                    slot: edit.placement.to_string(),
                    first: existing.pass.id().to_string(),
                    second: edit.pass.id().to_string(),
                });
            }
            slots.insert(edit.placement.clone(), edit);
        }

        let mut passes = Vec::with_capacity(base.len() + slots.len());
        for pass in base {
            let anchor = pass.id().to_string();
            if let Some(edit) = slots.remove(&Placement::Before(anchor.clone())) {
                passes.push(edit.pass);
            }
            passes.push(pass);
            if let Some(edit) = slots.remove(&Placement::After(anchor)) {
                passes.push(edit.pass);
            }
        }

        let mut seen = HashSet::new();
        for pass in &passes {
            if !seen.insert(pass.id().to_string()) {
                return Err(CoreError::DuplicatePass(pass.id().to_string()));
            }
        }

        let pipeline = Pipeline { passes };
        debug!(passes = ?pipeline.ids(), "resolved pass pipeline");
        Ok(pipeline)
    }

    pub fn passes(&self) -> &[Arc<dyn Pass>] {
        &self.passes
    }

    pub fn ids(&self) -> Vec<&str> {
        self.passes.iter().map(|pass| pass.id()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.passes.iter().any(|pass| pass.id() == id)
    }

    /// Run every pass over `job`. Returns whether the unit failed.
    ///
    /// After a pass reports errors the unit is failed and later passes are
    /// skipped unless they opt in. With `stop_after`, nothing runs after the
    /// named pass.
    pub fn run(
        &self,
        job: &mut Job,
        cx: &mut PassContext<'_>,
        stop_after: Option<&str>,
    ) -> Result<bool, CoreError> {
        let mut failed = cx.error_count() > 0;
        for pass in &self.passes {
            if failed && !pass.runs_on_failed() {
                trace!(pass = pass.id(), "skipping pass on failed unit");
            } else {
                trace!(pass = pass.id(), "running pass");
                let before = cx.error_count();
                pass.run(job, cx)?;
                failed |= cx.error_count() > before;
            }
            if stop_after == Some(pass.id()) {
                break;
            }
        }
        Ok(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;
    use crate::factory::{BaseExtFactory, BaseNodeFactory};
    use crate::span::Span;
    use crate::types::{TypeRegistry, TypeSystem};

    #[derive(Debug)]
    struct Named(&'static str);

    impl Pass for Named {
        fn id(&self) -> &str {
            self.0
        }

        fn run(&self, _job: &mut Job, _cx: &mut PassContext<'_>) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn edits() -> Vec<PassEdit> {
        vec![
            PassEdit::before("boxing", OUTPUT, Arc::new(Named("box-primitives"))),
            PassEdit::after("checks", TYPE_CHECK, Arc::new(Named("lint"))),
            PassEdit::before("early", DISAMBIGUATE, Arc::new(Named("expand"))),
        ]
    }

    #[test]
    fn resolution_ignores_registration_order() {
        let forward = Pipeline::resolve(base_passes(), edits()).expect("resolve");
        let mut reversed_edits = edits();
        reversed_edits.reverse();
        let reversed = Pipeline::resolve(base_passes(), reversed_edits).expect("resolve");
        assert_eq!(forward.ids(), reversed.ids());
        assert_eq!(
            forward.ids(),
            vec![
                BUILD_TYPES,
                "expand",
                DISAMBIGUATE,
                BUILD_SIGNATURES,
                TYPE_CHECK,
                "lint",
                "box-primitives",
                OUTPUT
            ]
        );
    }

    #[test]
    fn missing_anchor_is_fatal() {
        let err = Pipeline::resolve(
            base_passes(),
            vec![PassEdit::after("x", "flatten", Arc::new(Named("extra")))],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::MissingAnchor { ref anchor, .. } if anchor == "flatten"
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn sibling_edits_on_one_slot_are_rejected() {
        let err = Pipeline::resolve(
            base_passes(),
            vec![
                PassEdit::before("a", OUTPUT, Arc::new(Named("first"))),
                PassEdit::before("b", OUTPUT, Arc::new(Named("second"))),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateAnchor { .. }));
    }

    #[test]
    fn pass_ids_are_unique() {
        let err = Pipeline::resolve(
            base_passes(),
            vec![PassEdit::after("a", OUTPUT, Arc::new(Named(TYPE_CHECK)))],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::DuplicatePass(ref id) if id == TYPE_CHECK));
    }

    #[derive(Debug)]
    struct Rejecting;

    impl Pass for Rejecting {
        fn id(&self) -> &str {
            "reject"
        }

        fn run(&self, _job: &mut Job, cx: &mut PassContext<'_>) -> Result<(), CoreError> {
            cx.error("rejected", Span::synthetic());
            Ok(())
        }
    }

    /// Appends its id to the job's output.
    #[derive(Debug)]
    struct Recording {
        id: &'static str,
        on_failed: bool,
    }

    impl Pass for Recording {
        fn id(&self) -> &str {
            self.id
        }

        fn run(&self, job: &mut Job, _cx: &mut PassContext<'_>) -> Result<(), CoreError> {
            let output = job.output.get_or_insert_with(String::new);
            output.push_str(self.id);
            output.push(' ');
            Ok(())
        }

        fn runs_on_failed(&self) -> bool {
            self.on_failed
        }
    }

    #[test]
    fn only_opted_in_passes_run_on_failed_units() {
        let ts = TypeSystem::new(Arc::new(TypeRegistry::new()), Vec::new());
        let nf = BaseNodeFactory::new(Arc::new(BaseExtFactory));
        let mut cx = PassContext::new(&ts, &nf);
        let pipeline = Pipeline {
            passes: vec![
                Arc::new(Recording {
                    id: "first",
                    on_failed: false,
                }),
                Arc::new(Rejecting),
                Arc::new(Recording {
                    id: "skipped",
                    on_failed: false,
                }),
                Arc::new(Recording {
                    id: "summary",
                    on_failed: true,
                }),
            ],
        };
        let mut job = Job::new(Node::new(
            NodeKind::SourceFile {
                classes: Vec::new(),
            },
            Span::synthetic(),
        ));

        let failed = pipeline.run(&mut job, &mut cx, None).expect("run");
        assert!(failed);
        assert_eq!(job.output.as_deref(), Some("first summary "));
        assert_eq!(cx.error_count(), 1);
    }
}
