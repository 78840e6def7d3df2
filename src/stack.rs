//! Stack selection: which template subtree to materialize and which
//! dependency set to hand the templates.
//!
//! A stack is the combination of runtime, language, ORM, and web framework.
//! It resolves to a template directory `stacks/<runtime>/<lang>/<stack>`
//! beneath the template root, and to the dependency/script tables that
//! `package.json.hbs` templates iterate over.

use crate::engine::render::Context;
use clap::ValueEnum;
use serde_json::{Map, Value, json};
use std::{
    fmt,
    path::{Path, PathBuf},
};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Runtime {
    #[value(name = "nodejs")]
    Node,
    Bun,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    Ts,
    Js,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orm {
    Mongoose,
    Prisma,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framework {
    Express,
    Fastify,
}

impl Runtime {
    pub const fn as_str(self) -> &'static str {
        match self {
            Runtime::Node => "nodejs",
            Runtime::Bun => "bun",
        }
    }
}

impl Language {
    pub const fn as_str(self) -> &'static str {
        match self {
            Language::Ts => "ts",
            Language::Js => "js",
        }
    }
}

impl Orm {
    pub const fn as_str(self) -> &'static str {
        match self {
            Orm::Mongoose => "mongoose",
            Orm::Prisma => "prisma",
        }
    }
}

impl Framework {
    pub const fn as_str(self) -> &'static str {
        match self {
            Framework::Express => "express",
            Framework::Fastify => "fastify",
        }
    }
}

macro_rules! impl_display {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    )*};
}
impl_display!(Runtime, Language, Orm, Framework);

/// A fully specified stack choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stack {
    pub runtime: Runtime,
    pub language: Language,
    pub orm: Orm,
    pub framework: Framework,
}

impl Stack {
    /// Leaf directory name, e.g. `ts-prisma-fastify`.
    pub fn dir_name(&self) -> String {
        format!("{}-{}-{}", self.language, self.orm, self.framework)
    }

    /// Template subtree for this stack beneath `templates_root`.
    pub fn templates_dir(&self, templates_root: &Path) -> PathBuf {
        templates_root
            .join("stacks")
            .join(self.runtime.as_str())
            .join(self.language.as_str())
            .join(self.dir_name())
    }

    /// Build the render context for this stack: identity fields plus the
    /// dependency and script tables templates iterate over.
    pub fn context(&self, project_name: &str, package_manager: &str) -> Context {
        let deps = self.resolve_deps();
        let mut context = Context::new();
        context.insert("name".into(), json!(project_name));
        context.insert("runtime".into(), json!(self.runtime.as_str()));
        context.insert("language".into(), json!(self.language.as_str()));
        context.insert("orm".into(), json!(self.orm.as_str()));
        context.insert("framework".into(), json!(self.framework.as_str()));
        context.insert("pkgm".into(), json!(package_manager));
        context.insert("dependencies".into(), Value::Object(deps.dependencies));
        context.insert("devDependencies".into(), Value::Object(deps.dev_dependencies));
        context.insert("scripts".into(), Value::Object(deps.scripts));
        context
    }

    /// Resolve the pinned dependency tables for this stack.
    pub fn resolve_deps(&self) -> StackDeps {
        let mut deps = Map::new();
        let mut dev = Map::new();
        let mut scripts = Map::new();

        insert_all(&mut deps, COMMON_DEPS);

        match self.framework {
            Framework::Express => insert_all(&mut deps, EXPRESS_DEPS),
            Framework::Fastify => insert_all(&mut deps, FASTIFY_DEPS),
        }

        match self.orm {
            Orm::Mongoose => insert_all(&mut deps, MONGOOSE_DEPS),
            Orm::Prisma => {
                insert_all(&mut deps, PRISMA_DEPS);
                insert_all(&mut dev, PRISMA_DEV_DEPS);
                scripts.insert("postinstall".into(), json!("prisma generate"));
            }
        }

        let entry = match self.language {
            Language::Ts => {
                insert_all(&mut dev, TS_DEV_DEPS);
                scripts.insert("build".into(), json!("tsc -p tsconfig.json"));
                "src/server.ts"
            }
            Language::Js => {
                insert_all(&mut dev, JS_DEV_DEPS);
                "src/server.js"
            }
        };

        match self.runtime {
            Runtime::Bun => {
                scripts.insert("start".into(), json!(format!("bun run {entry}")));
                scripts.insert("dev".into(), json!(format!("bun --watch run {entry}")));
            }
            Runtime::Node => match self.language {
                Language::Ts => {
                    scripts.insert("start".into(), json!("node dist/server.js"));
                    scripts.insert("dev".into(), json!(format!("tsx watch {entry}")));
                }
                Language::Js => {
                    scripts.insert("start".into(), json!(format!("node {entry}")));
                    scripts.insert(
                        "dev".into(),
                        json!(format!("nodemon --watch src --exec \"node {entry}\"")),
                    );
                }
            },
        }

        StackDeps {
            dependencies: deps,
            dev_dependencies: dev,
            scripts,
        }
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.runtime, self.dir_name())
    }
}

/// Dependency tables injected into the render context.
#[derive(Debug)]
pub struct StackDeps {
    pub dependencies: Map<String, Value>,
    pub dev_dependencies: Map<String, Value>,
    pub scripts: Map<String, Value>,
}

fn insert_all(map: &mut Map<String, Value>, pairs: &[(&str, &str)]) {
    for (name, version) in pairs {
        map.insert(name.to_string(), json!(version));
    }
}

// Pinned dependency versions, one table per concern.

const COMMON_DEPS: &[(&str, &str)] = &[
    ("dotenv", "^17.2.3"),
    ("prom-client", "^15.1.3"),
    ("uuid", "^13.0.0"),
    ("winston", "^3.18.3"),
    ("winston-daily-rotate-file", "^5.0.0"),
];

const EXPRESS_DEPS: &[(&str, &str)] = &[
    ("express", "^5.1.0"),
    ("compression", "^1.8.1"),
    ("cors", "^2.8.5"),
    ("express-rate-limit", "^8.2.1"),
    ("helmet", "^8.1.0"),
    ("hpp", "^0.2.3"),
    ("joi", "^18.0.1"),
    ("morgan", "^1.10.1"),
];

const FASTIFY_DEPS: &[(&str, &str)] = &[
    ("fastify", "^5.6.2"),
    ("fastify-plugin", "^5.1.0"),
    ("@fastify/helmet", "^13.0.2"),
    ("@fastify/compress", "^8.3.0"),
    ("@fastify/rate-limit", "^10.3.0"),
    ("@fastify/cors", "^11.1.0"),
    ("joi", "^18.0.1"),
    ("pino", "^9.2.0"),
    ("pino-pretty", "^10.3.0"),
];

const MONGOOSE_DEPS: &[(&str, &str)] = &[("mongoose", "^8.19.4")];

const PRISMA_DEPS: &[(&str, &str)] = &[("@prisma/client", "^6.19.0")];

const PRISMA_DEV_DEPS: &[(&str, &str)] = &[("prisma", "^6.19.0")];

const TS_DEV_DEPS: &[(&str, &str)] = &[
    ("typescript", "^5.9.3"),
    ("tsx", "^4.19.0"),
    ("tslib", "^2.6.0"),
    ("@types/node", "^20.11.0"),
    ("esbuild", "^0.25.12"),
    ("rimraf", "^6.0.1"),
];

const JS_DEV_DEPS: &[(&str, &str)] = &[("nodemon", "^3.1.11"), ("esbuild", "^0.25.12")];
