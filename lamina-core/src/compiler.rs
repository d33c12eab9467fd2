//! Session driver: compiles units through their bootstrap's pipeline.

use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::ast::Node;
use crate::bootstrap::{LayerBootstrap, LayerRegistry};
use crate::context::PassContext;
use crate::diagnostic::Diagnostic;
use crate::error::CoreError;
use crate::pipeline::Job;
use crate::sources::SourceUnit;
use crate::span::FileId;

#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Compile units on the rayon pool.
    pub parallel: bool,
    /// Last pass to run.
    pub stop_after: Option<String>,
    /// Keep the rendered text of each unit.
    pub emit_output: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            parallel: true,
            stop_after: None,
            emit_output: true,
        }
    }
}

/// Outcome of one unit.
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub path: PathBuf,
    /// Bootstrap that compiled the unit; `None` when no layer claims it.
    pub layer: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub failed: bool,
    pub ast: Option<Node>,
    pub output: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    pub units: Vec<UnitReport>,
}

impl SessionReport {
    pub fn failed(&self) -> bool {
        self.units.iter().any(|unit| unit.failed)
    }

    pub fn error_count(&self) -> usize {
        self.units
            .iter()
            .flat_map(|unit| &unit.diagnostics)
            .filter(|d| d.is_error())
            .count()
    }
}

/// Compile a single in-memory unit.
pub fn compile_source(
    bootstrap: &LayerBootstrap,
    source: &str,
    options: &CompileOptions,
) -> Result<UnitReport, CoreError> {
    check_stop_after(bootstrap, options)?;
    compile_unit(bootstrap, FileId(0), PathBuf::from("<source>"), source, options)
}

pub fn compile_unit(
    bootstrap: &LayerBootstrap,
    file: FileId,
    path: PathBuf,
    source: &str,
    options: &CompileOptions,
) -> Result<UnitReport, CoreError> {
    let parsed = bootstrap.parse(file, source)?;
    let mut diagnostics = parsed.diagnostics;
    let Some(ast) = parsed.file else {
        warn!(path = %path.display(), layer = bootstrap.name(), "unit has syntax errors");
        return Ok(UnitReport {
            path,
            layer: Some(bootstrap.name().to_string()),
            diagnostics,
            failed: true,
            ast: None,
            output: None,
        });
    };

    let mut cx = PassContext::new(bootstrap.type_system(), bootstrap.node_factory());
    let mut job = Job::new(ast);
    let failed = bootstrap
        .pipeline()
        .run(&mut job, &mut cx, options.stop_after.as_deref())?;
    diagnostics.extend(cx.into_diagnostics());
    if failed {
        warn!(
            path = %path.display(),
            layer = bootstrap.name(),
            errors = diagnostics.iter().filter(|d| d.is_error()).count(),
            "unit failed"
        );
    }

    Ok(UnitReport {
        path,
        layer: Some(bootstrap.name().to_string()),
        diagnostics,
        failed,
        ast: Some(job.ast),
        output: if options.emit_output && !failed {
            job.output
        } else {
            None
        },
    })
}

/// Compile every unit with the bootstrap registered for its extension.
///
/// Unit failures are reported per unit. An authoring or internal error
/// aborts the whole session.
pub fn compile_session(
    registry: &LayerRegistry,
    units: &[SourceUnit],
    options: &CompileOptions,
) -> Result<SessionReport, CoreError> {
    for unit in units {
        if let Some(bootstrap) = registry.for_path(&unit.path) {
            check_stop_after(bootstrap, options)?;
        }
    }
    debug!(units = units.len(), parallel = options.parallel, "compiling session");

    let compile = |(index, unit): (usize, &SourceUnit)| -> Result<UnitReport, CoreError> {
        let Some(bootstrap) = registry.for_path(&unit.path) else {
            let err = CoreError::UnsupportedSource(unit.path.clone());
            warn!(path = %unit.path.display(), "no layer claims unit");
            return Ok(UnitReport {
                path: unit.path.clone(),
                layer: None,
                diagnostics: vec![Diagnostic::error(err.to_string(), Default::default())],
                failed: true,
                ast: None,
                output: None,
            });
        };
        let file = FileId(u32::try_from(index).unwrap_or(u32::MAX));
        compile_unit(bootstrap, file, unit.path.clone(), &unit.contents, options)
    };

    let units = if options.parallel {
        units
            .par_iter()
            .enumerate()
            .map(compile)
            .collect::<Result<Vec<_>, _>>()?
    } else {
        units
            .iter()
            .enumerate()
            .map(compile)
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(SessionReport { units })
}

fn check_stop_after(bootstrap: &LayerBootstrap, options: &CompileOptions) -> Result<(), CoreError> {
    match &options.stop_after {
        Some(pass) if !bootstrap.pipeline().contains(pass) => {
            Err(CoreError::UnknownPass(pass.clone()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers;
    use crate::pipeline;

    fn units() -> Vec<SourceUnit> {
        vec![
            SourceUnit::new(
                "a/Plain.lm",
                "class Plain {\n    int id(int x) {\n        return x;\n    }\n}\n",
            ),
            SourceUnit::new(
                "a/Broken.lm",
                "class Broken {\n    int bad() {\n        return true;\n    }\n}\n",
            ),
            SourceUnit::new(
                "b/Frozen.lma",
                "class Frozen {\n    int[] cells;\n}\n",
            ),
            SourceUnit::new(
                "b/Boxed.lmb",
                "class Boxed {\n    int one() {\n        return 1;\n    }\n}\n",
            ),
            SourceUnit::new("b/Syntax.lm", "class {\n"),
        ]
    }

    #[test]
    fn parallel_and_sequential_sessions_agree() {
        let registry = layers::standard_registry().expect("registry");
        let parallel = compile_session(&registry, &units(), &CompileOptions::default())
            .expect("parallel");
        let sequential = compile_session(
            &registry,
            &units(),
            &CompileOptions {
                parallel: false,
                ..CompileOptions::default()
            },
        )
        .expect("sequential");

        assert_eq!(parallel.units.len(), 5);
        for (left, right) in parallel.units.iter().zip(&sequential.units) {
            assert_eq!(left.path, right.path);
            assert_eq!(left.failed, right.failed);
            assert_eq!(left.output, right.output);
            assert_eq!(left.diagnostics, right.diagnostics);
        }

        let failed: Vec<_> = parallel
            .units
            .iter()
            .map(|unit| (unit.layer.as_deref(), unit.failed))
            .collect();
        assert_eq!(
            failed,
            vec![
                (Some("base"), false),
                (Some("base"), true),
                (Some("array"), false),
                (Some("boxing"), false),
                (Some("base"), true),
            ]
        );
        assert!(parallel.failed());
        assert!(parallel.error_count() >= 2);
        assert!(
            parallel.units[3]
                .output
                .as_deref()
                .is_some_and(|text| text.contains("new lamina.runtime.Integer(1)"))
        );
    }

    #[test]
    fn failing_units_do_not_stop_others() {
        let registry = layers::standard_registry().expect("registry");
        let report =
            compile_session(&registry, &units(), &CompileOptions::default()).expect("session");
        let broken = &report.units[1];
        assert!(broken.output.is_none());
        assert!(
            broken
                .diagnostics
                .iter()
                .any(|d| d.message.contains("not assignable"))
        );
        assert!(report.units[0].output.is_some());
    }

    #[test]
    fn unclaimed_sources_fail_their_unit() {
        let registry = layers::standard_registry().expect("registry");
        let units = vec![SourceUnit::new("notes.txt", "hello")];
        let report =
            compile_session(&registry, &units, &CompileOptions::default()).expect("session");
        assert!(report.failed());
        assert_eq!(report.units[0].layer, None);
        assert!(report.units[0].diagnostics[0].message.contains("notes.txt"));
    }

    #[test]
    fn stop_after_ends_the_pipeline() {
        let registry = layers::standard_registry().expect("registry");
        let options = CompileOptions {
            stop_after: Some(pipeline::DISAMBIGUATE.to_string()),
            ..CompileOptions::default()
        };
        let report = compile_session(&registry, &units(), &options).expect("session");
        // type errors are only found by the type-check pass
        assert!(!report.units[1].failed);
        assert!(report.units.iter().all(|unit| unit.output.is_none()));
    }

    #[test]
    fn unknown_stop_after_is_rejected_before_compiling() {
        let registry = layers::standard_registry().expect("registry");
        let options = CompileOptions {
            stop_after: Some("box-primitives".to_string()),
            ..CompileOptions::default()
        };
        let err = compile_session(&registry, &units(), &options).unwrap_err();
        assert!(matches!(err, CoreError::UnknownPass(ref pass) if pass == "box-primitives"));
        assert!(err.is_fatal());

        let only_boxing = vec![units().remove(3)];
        assert!(compile_session(&registry, &only_boxing, &options).is_ok());
    }

    #[test]
    fn output_can_be_suppressed() {
        let bootstrap = layers::bootstrap(layers::base::NAME).expect("base");
        let options = CompileOptions {
            emit_output: false,
            ..CompileOptions::default()
        };
        let report = compile_source(
            &bootstrap,
            "class A {\n}\n",
            &options,
        )
        .expect("compile");
        assert!(!report.failed);
        assert!(report.output.is_none());
        assert!(report.ast.is_some());
    }
}
