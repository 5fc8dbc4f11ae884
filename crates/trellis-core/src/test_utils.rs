//! Test fixtures for Trellis

use crate::model::{
    EdgeKind, RawClass, RawGraph, RawImport, RawInterface, RawMember, RawModule,
    RawPackage, RawPackageDependency, RawRelationship,
};

fn module(id: &str, path: &str, imports: &[(&str, Option<&str>)]) -> RawModule {
    RawModule {
        id: id.to_string(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path: path.to_string(),
        imports: imports
            .iter()
            .map(|(specifier, resolved)| RawImport {
                specifier: specifier.to_string(),
                resolved: resolved.map(str::to_string),
            })
            .collect(),
        ..RawModule::default()
    }
}

fn member(id: &str, name: &str) -> RawMember {
    RawMember {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// Two packages with nested folders, a class hierarchy, a test module and
/// a couple of unresolved imports.
///
/// ```text
/// api (packages/api)                     core (packages/core)
///   index.ts          -> router           src/service.ts  Service, Runnable
///   src/http/router.ts -> service, express src/unused.ts
///   src/http/router.test.ts -> router
/// ```
pub fn sample_graph() -> RawGraph {
    let mut router = module(
        "api/router",
        "packages/api/src/http/router.ts",
        &[("../../core/service", Some("core/service")), ("express", None)],
    );
    router.classes.push(RawClass {
        id: "api/Router".into(),
        name: "Router".into(),
        extends: Some("core/Service".into()),
        implements: vec!["core/Runnable".into()],
        properties: vec![member("api/Router.routes", "routes")],
        methods: vec![member("api/Router.handle", "handle")],
    });

    let mut service = module("core/service", "packages/core/src/service.ts", &[]);
    service.classes.push(RawClass {
        id: "core/Service".into(),
        name: "Service".into(),
        ..RawClass::default()
    });
    service.interfaces.push(RawInterface {
        id: "core/Runnable".into(),
        name: "Runnable".into(),
        methods: vec![member("core/Runnable.run", "run")],
        ..RawInterface::default()
    });

    RawGraph {
        packages: vec![
            RawPackage {
                id: "api".into(),
                name: "api".into(),
                path: Some("packages/api".into()),
                modules: vec![
                    module("api/index", "packages/api/index.ts", &[("./src/http/router", Some("api/router"))]),
                    router,
                    module(
                        "api/router.test",
                        "packages/api/src/http/router.test.ts",
                        &[("./router", Some("api/router"))],
                    ),
                ],
                dependencies: vec![
                    RawPackageDependency {
                        target: "core".into(),
                        kind: EdgeKind::Dependency,
                    },
                    RawPackageDependency {
                        target: "left-pad".into(),
                        kind: EdgeKind::Dependency,
                    },
                ],
            },
            RawPackage {
                id: "core".into(),
                name: "core".into(),
                path: Some("packages/core".into()),
                modules: vec![service, module("core/unused", "packages/core/src/unused.ts", &[])],
                dependencies: Vec::new(),
            },
        ],
        relationships: vec![
            RawRelationship {
                source: "api/index".into(),
                target: "core/service".into(),
                kind: Some(EdgeKind::Uses),
            },
            RawRelationship {
                source: "api/router".into(),
                target: "missing".into(),
                kind: None,
            },
        ],
    }
}

/// Modules `A -> B -> C -> A` in one package, nothing else.
pub fn cycle_graph() -> RawGraph {
    RawGraph {
        packages: vec![RawPackage {
            id: "p".into(),
            name: "p".into(),
            path: Some("p".into()),
            modules: vec![
                module("A", "p/src/a.ts", &[("./b", Some("B"))]),
                module("B", "p/src/b.ts", &[("./c", Some("C"))]),
                module("C", "p/src/c.ts", &[("./a", Some("A"))]),
            ],
            dependencies: Vec::new(),
        }],
        relationships: Vec::new(),
    }
}
