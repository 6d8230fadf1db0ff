//! Script bundling.
//!
//! Each entry module is parsed with oxc and its relative imports are inlined
//! depth-first into one scope. Every module is emitted once, before the first
//! module that imports it, with `import`/`export` syntax removed; renamed
//! bindings become `const` aliases. The result is wrapped in an IIFE.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_tasks::{StepError, StepOutput, TransformStep};
use oxc_allocator::Allocator;
use oxc_ast::ast::{ExportDefaultDeclarationKind, ImportDeclarationSpecifier, Statement};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};

use crate::config::BuildConfig;
use crate::discover::glob_files;
use crate::output::Outputs;

/// Bundles each entry script into `assets/<name>.js`.
pub struct ScriptsStep {
    config: Arc<BuildConfig>,
}

impl ScriptsStep {
    pub fn new(config: Arc<BuildConfig>) -> Self {
        Self { config }
    }
}

impl TransformStep for ScriptsStep {
    fn run(&self) -> Result<StepOutput, StepError> {
        let out_dir = self.config.output_dir.join("assets");
        let entries = glob_files(
            &self.config.source_root,
            &self.config.script_entries,
            &self.config.output_dir,
        )?;

        let mut outputs = Outputs::new();
        for entry in entries {
            let js = ScriptBundler::new(&self.config).bundle(&entry)?;

            let display = self.config.display_path(&entry);
            let name = entry
                .file_stem()
                .and_then(|n| n.to_str())
                .unwrap_or("main");
            outputs
                .add(out_dir.join(format!("{}.js", name)), js, &display)
                .map_err(|e| StepError::Bundle(format!("{}: {}", display, e)))?;
        }
        let written = outputs.write()?;

        tracing::debug!("Bundled {} scripts", written.len());
        Ok(StepOutput::with_files(written))
    }
}

/// A replacement of `source[start..end]`.
#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    kind: EditKind,
}

#[derive(Debug)]
enum EditKind {
    /// Drop the text
    Remove,
    /// Replace with literal text
    Text(String),
    /// An import or re-export; resolved once the dependency is bundled
    Link { dependency: usize, aliases: Vec<Alias> },
}

/// `const local = <name exported by the dependency>;`
#[derive(Debug)]
enum Alias {
    Named { imported: String, local: String },
    Default { local: String },
}

/// What the parser found in one module.
#[derive(Debug, Default)]
struct ModuleScan {
    edits: Vec<Edit>,
    /// Import specifiers in source order
    dependencies: Vec<String>,
    default_export: Option<String>,
}

struct ScriptBundler<'c> {
    config: &'c BuildConfig,
    done: HashSet<PathBuf>,
    visiting: Vec<PathBuf>,
    defaults: HashMap<PathBuf, String>,
    /// Modules entered so far; keeps generated names unique
    started: usize,
    out: String,
}

impl<'c> ScriptBundler<'c> {
    fn new(config: &'c BuildConfig) -> Self {
        Self {
            config,
            done: HashSet::new(),
            visiting: Vec::new(),
            defaults: HashMap::new(),
            started: 0,
            out: String::new(),
        }
    }

    fn bundle(mut self, entry: &Path) -> Result<String, StepError> {
        let entry = entry
            .canonicalize()
            .map_err(|e| self.error(entry, &e.to_string()))?;
        self.include(&entry)?;
        Ok(format!("(function () {{\n'use strict';\n{}}})();\n", self.out))
    }

    fn error(&self, path: &Path, message: &str) -> StepError {
        StepError::Bundle(format!("{}: {}", self.config.display_path(path), message))
    }

    fn include(&mut self, path: &Path) -> Result<(), StepError> {
        if self.done.contains(path) {
            return Ok(());
        }
        if self.visiting.iter().any(|p| p == path) {
            return Err(self.error(path, "circular import"));
        }
        self.visiting.push(path.to_path_buf());
        self.started += 1;

        let source = fs::read_to_string(path)?;
        let mut scan = scan_module(&source, &self.default_name(path))
            .map_err(|message| self.error(path, &message))?;

        // depth-first: dependencies land in the output before this module
        let mut resolved = Vec::with_capacity(scan.dependencies.len());
        for specifier in &scan.dependencies {
            let dependency = resolve(path, specifier).map_err(|message| self.error(path, &message))?;
            self.include(&dependency)?;
            resolved.push(dependency);
        }

        let mut text = String::with_capacity(source.len());
        let mut cursor = 0;
        scan.edits.sort_by_key(|edit| edit.start);
        for edit in &scan.edits {
            text.push_str(&source[cursor..edit.start]);
            match &edit.kind {
                EditKind::Remove => {}
                EditKind::Text(replacement) => text.push_str(replacement),
                EditKind::Link {
                    dependency,
                    aliases,
                } => {
                    let dependency = &resolved[*dependency];
                    text.push_str(&self.link(path, dependency, aliases)?);
                }
            }
            cursor = edit.end;
        }
        text.push_str(&source[cursor..]);

        if !self.config.is_production() {
            self.out.push_str(&format!("// {}\n", self.config.display_path(path)));
        }
        self.out.push_str(text.trim_end());
        self.out.push('\n');

        if let Some(name) = scan.default_export {
            self.defaults.insert(path.to_path_buf(), name);
        }
        self.visiting.pop();
        self.done.insert(path.to_path_buf());
        Ok(())
    }

    fn link(&self, importer: &Path, dependency: &Path, aliases: &[Alias]) -> Result<String, StepError> {
        let mut text = String::new();
        for alias in aliases {
            let (local, target) = match alias {
                Alias::Named { imported, local } => (local, imported.as_str()),
                Alias::Default { local } => {
                    let target = self.defaults.get(dependency).ok_or_else(|| {
                        self.error(
                            importer,
                            &format!(
                                "'{}' has no default export",
                                self.config.display_path(dependency)
                            ),
                        )
                    })?;
                    (local, target.as_str())
                }
            };
            if local != target {
                text.push_str(&format!("const {} = {};", local, target));
            }
        }
        Ok(text)
    }

    /// Binding that holds an anonymous default export of `path`.
    fn default_name(&self, path: &Path) -> String {
        let stem: String = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("__{}_default_{}", stem, self.started)
    }
}

fn scan_module(source: &str, default_name: &str) -> Result<ModuleScan, String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
    if let Some(error) = ret.errors.first() {
        return Err(error.to_string());
    }

    let mut scan = ModuleScan::default();

    for statement in ret.program.body.iter() {
        let span = statement.span();
        let (start, end) = (span.start as usize, span.end as usize);

        match statement {
            Statement::ImportDeclaration(decl) => {
                let mut aliases = Vec::new();
                for specifier in decl.specifiers.iter().flat_map(|list| list.iter()) {
                    match specifier {
                        ImportDeclarationSpecifier::ImportSpecifier(s) => aliases.push(Alias::Named {
                            imported: s.imported.name().to_string(),
                            local: s.local.name.to_string(),
                        }),
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                            aliases.push(Alias::Default {
                                local: s.local.name.to_string(),
                            })
                        }
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                            return Err(format!(
                                "namespace import '* as {}' is not supported",
                                s.local.name
                            ));
                        }
                    }
                }
                let dependency = scan.add_dependency(decl.source.value.as_str());
                scan.edits.push(Edit {
                    start,
                    end,
                    kind: EditKind::Link {
                        dependency,
                        aliases,
                    },
                });
            }

            Statement::ExportNamedDeclaration(decl) => {
                if let Some(declaration) = &decl.declaration {
                    // keep the declaration, drop the keyword
                    scan.edits.push(Edit {
                        start,
                        end: declaration.span().start as usize,
                        kind: EditKind::Remove,
                    });
                } else if let Some(from) = &decl.source {
                    let aliases = decl
                        .specifiers
                        .iter()
                        .map(|s| Alias::Named {
                            imported: s.local.name().to_string(),
                            local: s.exported.name().to_string(),
                        })
                        .collect();
                    let dependency = scan.add_dependency(from.value.as_str());
                    scan.edits.push(Edit {
                        start,
                        end,
                        kind: EditKind::Link {
                            dependency,
                            aliases,
                        },
                    });
                } else {
                    let aliases: String = decl
                        .specifiers
                        .iter()
                        .filter(|s| s.local.name() != s.exported.name())
                        .map(|s| format!("const {} = {};", s.exported.name(), s.local.name()))
                        .collect();
                    scan.edits.push(Edit {
                        start,
                        end,
                        kind: EditKind::Text(aliases),
                    });
                }
            }

            Statement::ExportDefaultDeclaration(decl) => {
                let inner = decl.declaration.span();
                let named = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(f) => f.id.as_ref(),
                    ExportDefaultDeclarationKind::ClassDeclaration(c) => c.id.as_ref(),
                    _ => None,
                };

                if let Some(id) = named {
                    scan.default_export = Some(id.name.to_string());
                    scan.edits.push(Edit {
                        start,
                        end: inner.start as usize,
                        kind: EditKind::Remove,
                    });
                } else {
                    let expression = &source[inner.start as usize..inner.end as usize];
                    scan.default_export = Some(default_name.to_string());
                    scan.edits.push(Edit {
                        start,
                        end,
                        kind: EditKind::Text(format!("const {} = {};", default_name, expression)),
                    });
                }
            }

            Statement::ExportAllDeclaration(_) => {
                return Err("'export *' is not supported".to_string());
            }

            _ => {}
        }
    }

    Ok(scan)
}

impl ModuleScan {
    fn add_dependency(&mut self, specifier: &str) -> usize {
        self.dependencies.push(specifier.to_string());
        self.dependencies.len() - 1
    }
}

/// Resolve a relative specifier against the importing file.
fn resolve(importer: &Path, specifier: &str) -> Result<PathBuf, String> {
    if !(specifier.starts_with("./") || specifier.starts_with("../")) {
        return Err(format!("cannot resolve bare import '{}'", specifier));
    }

    let base = importer.parent().unwrap_or(Path::new("")).join(specifier);
    let candidates = [
        base.clone(),
        base.with_extension("js"),
        base.with_extension("mjs"),
        base.join("index.js"),
    ];

    candidates
        .iter()
        .find(|candidate| candidate.is_file())
        .and_then(|found| found.canonicalize().ok())
        .ok_or_else(|| format!("cannot resolve import '{}'", specifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildMode;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn config(root: &Path, mode: BuildMode) -> Arc<BuildConfig> {
        Arc::new(BuildConfig {
            source_root: root.canonicalize().unwrap(),
            output_dir: root.join("dist"),
            mode,
            ..Default::default()
        })
    }

    #[test]
    fn inlines_imports_depth_first_once() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(root, "scripts/lib/dom.js", "export const $ = (s) => document.querySelector(s);\n");
        write(
            root,
            "scripts/lib/menu.js",
            "import { $ } from './dom.js';\nexport function toggle() { $('nav').hidden ^= 1; }\n",
        );
        write(
            root,
            "scripts/main.js",
            "import { $ } from './lib/dom';\nimport { toggle as flip } from './lib/menu.js';\n$('button').onclick = flip;\n",
        );

        ScriptsStep::new(config(root, BuildMode::Production)).run().unwrap();

        let js = fs::read_to_string(root.join("dist/assets/main.js")).unwrap();
        assert_eq!(
            js,
            "(function () {\n'use strict';\n\
             const $ = (s) => document.querySelector(s);\n\
             \nfunction toggle() { $('nav').hidden ^= 1; }\n\
             \nconst flip = toggle;\n$('button').onclick = flip;\n\
             })();\n"
        );
    }

    #[test]
    fn default_exports_become_bindings() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(root, "scripts/config.js", "export default { theme: 'dark' };\n");
        write(root, "scripts/greet.js", "export default function greet() { return 'hi'; }\n");
        write(
            root,
            "scripts/main.js",
            "import settings from './config.js';\nimport greet from './greet.js';\nconsole.log(settings.theme, greet());\n",
        );

        ScriptsStep::new(config(root, BuildMode::Development)).run().unwrap();

        let js = fs::read_to_string(root.join("dist/assets/main.js")).unwrap();
        assert!(js.contains("// scripts/config.js\nconst __config_default_2 = { theme: 'dark' };"));
        assert!(js.contains("// scripts/greet.js\nfunction greet() { return 'hi'; }"));
        assert!(js.contains("const settings = __config_default_2;"));
        assert!(!js.contains("const greet = greet;"));
        assert!(!js.contains("import"));
        assert!(!js.contains("export"));
    }

    #[test]
    fn banners_are_development_only() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(root, "scripts/main.js", "console.log(1);\n");

        ScriptsStep::new(config(root, BuildMode::Development)).run().unwrap();
        let dev = fs::read_to_string(root.join("dist/assets/main.js")).unwrap();
        assert!(dev.contains("// scripts/main.js\n"));

        ScriptsStep::new(config(root, BuildMode::Production)).run().unwrap();
        let prod = fs::read_to_string(root.join("dist/assets/main.js")).unwrap();
        assert!(!prod.contains("//"));
    }

    #[test]
    fn reports_bundle_errors() {
        let temp = tempdir().unwrap();
        let root = temp.path();

        write(root, "scripts/main.js", "import x from 'left-pad';\n");
        let err = ScriptsStep::new(config(root, BuildMode::Development)).run().unwrap_err();
        assert_eq!(
            err,
            StepError::Bundle("scripts/main.js: cannot resolve bare import 'left-pad'".into())
        );

        write(root, "scripts/main.js", "const = ;\n");
        let err = ScriptsStep::new(config(root, BuildMode::Development)).run().unwrap_err();
        assert!(matches!(err, StepError::Bundle(ref msg) if msg.starts_with("scripts/main.js: ")));

        write(root, "scripts/main.js", "import './a.js';\n");
        write(root, "scripts/a.js", "import './main.js';\n");
        let err = ScriptsStep::new(config(root, BuildMode::Development)).run().unwrap_err();
        assert!(matches!(err, StepError::Bundle(ref msg) if msg.ends_with("circular import")));
    }

    #[test]
    fn failed_entry_keeps_previous_output() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        write(root, "scripts/app.js", "console.log('old');\n");
        write(root, "scripts/widgets.js", "console.log('widgets');\n");
        let step = ScriptsStep::new(config(root, BuildMode::Production));
        step.run().unwrap();
        let before = fs::read_to_string(root.join("dist/assets/app.js")).unwrap();

        write(root, "scripts/app.js", "console.log('new');\n");
        write(root, "scripts/widgets.js", "import { gone } from './gone.js';\n");
        assert!(step.run().is_err());

        assert_eq!(fs::read_to_string(root.join("dist/assets/app.js")).unwrap(), before);
    }
}
