use assert_matches::assert_matches;
use serde_json::{json, Map, Value};

use ramlift_core::errors::CycleKind;
use ramlift_core::loader::load_graph;
use ramlift_core::prelude::*;
use ramlift_core::template::resolve_templates;

fn compile_src(src: &MemorySource, request: CompileRequest) -> RamliftResult<CompileReport> {
    compile(src, &request, &PluginHost::new())
}

fn single(text: &str) -> RamliftResult<CompileReport> {
    compile_src(&MemorySource::new().with("api.raml", text), CompileRequest::new("api.raml"))
}

#[test]
fn plain_document_survives_template_resolution_unchanged() {
    let text = "#%RAML 1.0\ntitle: Plain\n/a:\n  get:\n    description: d\n    responses:\n      200:\n        body:\n          application/json:\n            type: object\n  /b:\n    post:\n";
    let src = MemorySource::new().with("api.raml", text);
    let graph = load_graph(&src, &LimitsConfig::default(), &DocumentRef::new("api.raml"), &[]).unwrap();
    let before = graph.root.clone();
    let expanded = resolve_templates(graph, &CoreConfig::default()).unwrap();
    assert_eq!(expanded.graph.root, before);
    assert_eq!(expanded.expansions, 0);
}

#[test]
fn traits_leave_no_placeholders_and_never_override_explicit_properties() {
    let report = single(
        "#%RAML 1.0\ntitle: T\ntraits:\n  paged:\n    description: <<resourcePathName>> paged by <<size>>\n    queryParameters:\n      page:\n        type: integer\n        description: page of <<resourcePathName | !singularize>> items\n/books:\n  get:\n    is: [paged: {size: 20}]\n  post:\n    is: [paged: {size: 5}]\n    description: explicit\n",
    )
    .unwrap();
    let rendered = report.render(OutputFormat::Json).unwrap();
    assert!(!rendered.contains("<<"));

    let get = &report.document["paths"]["/books"]["get"];
    assert_eq!(get["description"], "books paged by 20");
    assert_eq!(get["parameters"][0]["description"], "page of book items");
    assert_eq!(report.document["paths"]["/books"]["post"]["description"], "explicit");
}

#[test]
fn overlays_apply_in_order_last_wins() {
    let src = MemorySource::new()
        .with("api.raml", "#%RAML 1.0\ntitle: T\n/a:\n  get:\n")
        .with("o1.raml", "#%RAML 1.0 Overlay\nextends: api.raml\ndescription: five\n")
        .with("o2.raml", "#%RAML 1.0 Overlay\nextends: api.raml\ndescription: seven\n");
    let report = compile_src(&src, CompileRequest::new("api.raml").overlay("o1.raml").overlay("o2.raml")).unwrap();
    assert_eq!(report.document["info"]["description"], "seven");
    assert_eq!(report.stats.overlays, 2);
}

#[test]
fn resource_type_chain_unions_with_most_specific_winning() {
    let report = single(
        "#%RAML 1.0\ntitle: T\nresourceTypes:\n  A:\n    description: from A\n    get:\n      description: A get\n    delete:\n      description: A delete\n  B:\n    type: A\n    description: from B\n    post:\n      description: B post\n  C:\n    type: B\n    get:\n      description: C get\n/things:\n  type: C\n",
    )
    .unwrap();
    let item = &report.document["paths"]["/things"];
    assert_eq!(item["description"], "from B");
    assert_eq!(item["get"]["description"], "C get");
    assert_eq!(item["post"]["description"], "B post");
    assert_eq!(item["delete"]["description"], "A delete");
}

#[test]
fn mutually_recursive_base_types_fail_naming_both() {
    let err = single("#%RAML 1.0\ntitle: T\ntypes:\n  T1:\n    type: T2\n  T2:\n    type: T1\n").unwrap_err();
    assert_matches!(err, RamliftError::CircularInheritance { kind: CycleKind::Type, .. });
    let chain = err.chain().unwrap();
    assert!(chain.iter().any(|t| t == "T1"));
    assert!(chain.iter().any(|t| t == "T2"));
}

#[test]
fn undeclared_uri_parameter_fails_deterministically() {
    let text = "#%RAML 1.0\ntitle: T\n/users:\n  /{id}:\n    get:\n";
    let a = single(text).unwrap_err();
    let b = single(text).unwrap_err();
    assert_eq!(a.kind(), ErrorKind::Structure);
    assert_eq!(a.path().unwrap().to_string(), "#/~1users/~1{id}");
    assert_eq!(a.to_string(), b.to_string());
}

struct CustomFlag;

impl BuildHook for CustomFlag {
    fn name(&self) -> &str {
        "test.custom-flag"
    }

    fn observes(&self) -> &[NodeKind] {
        &[NodeKind::Resource]
    }

    fn on_node(&self, _node: NodeRef<'_>, _fragment: Option<&Value>, _cx: &mut HookContext<'_>) -> anyhow::Result<HookAction> {
        let mut fields = Map::new();
        fields.insert("x-custom".to_string(), json!(true));
        Ok(HookAction::Extend(fields))
    }
}

#[test]
fn resource_plugin_marks_every_path_item_and_removal_restores_baseline() {
    let text = "#%RAML 1.0\ntitle: T\n/a:\n  get:\n  /b:\n    get:\n/c:\n  post:\n";
    let src = MemorySource::new().with("api.raml", text);
    let request = CompileRequest::new("api.raml");

    let baseline = compile(&src, &request, &PluginHost::new()).unwrap();

    let mut host = PluginHost::new();
    host.register(CustomFlag).unwrap();
    let extended = compile(&src, &request, &host).unwrap();
    let paths = extended.document["paths"].as_object().unwrap();
    assert_eq!(paths.len(), 3);
    assert!(paths.values().all(|item| item["x-custom"] == json!(true)));

    assert!(host.unregister("test.custom-flag"));
    let again = compile(&src, &request, &host).unwrap();
    assert_eq!(again.document, baseline.document);
    assert_eq!(again.stats.digest, baseline.stats.digest);
}

struct Failing;

impl BuildHook for Failing {
    fn name(&self) -> &str {
        "test.failing"
    }

    fn observes(&self) -> &[NodeKind] {
        &[NodeKind::Method]
    }

    fn on_node(&self, _node: NodeRef<'_>, _fragment: Option<&Value>, cx: &mut HookContext<'_>) -> anyhow::Result<HookAction> {
        anyhow::bail!("cannot handle {}", cx.path)
    }
}

#[test]
fn plugin_errors_are_fatal() {
    let src = MemorySource::new().with("api.raml", "#%RAML 1.0\ntitle: T\n/a:\n  get:\n");
    let mut host = PluginHost::new();
    host.register(Failing).unwrap();
    let err = compile(&src, &CompileRequest::new("api.raml"), &host).unwrap_err();
    assert_matches!(err, RamliftError::Plugin { ref plugin, .. } if plugin == "test.failing");
    assert_eq!(err.path().unwrap().to_string(), "#/~1a/get");
}

#[test]
fn unsupported_constructs_warn_by_default_and_fail_in_strict_mode() {
    let text = "#%RAML 1.0\ntitle: T\nsecuritySchemes:\n  legacy:\n    type: OAuth 1.0\n    settings:\n      requestTokenUri: https://a/r\n      authorizationUri: https://a/a\n      tokenCredentialsUri: https://a/t\n/a:\n  securedBy: [legacy]\n  get:\n    body:\n      application/json:\n";
    let src = MemorySource::new().with("api.raml", text);

    let report = compile(&src, &CompileRequest::new("api.raml"), &PluginHost::new()).unwrap();
    let codes: Vec<&str> = report.warnings().map(|d| d.code.as_str()).collect();
    assert_eq!(codes, ["build.unsupported", "build.unsupported"]);
    assert!(report.document["paths"]["/a"]["get"].get("requestBody").is_none());
    assert!(report.document["paths"]["/a"]["get"].get("security").is_none());
    assert!(report.document.pointer("/components/securitySchemes").is_none());

    let mut config = CoreConfig::default();
    config.build.strict = true;
    let err = compile(&src, &CompileRequest::new("api.raml").config(config), &PluginHost::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedConstruct);
}

#[test]
fn libraries_types_and_security_translate() {
    let src = MemorySource::new()
        .with(
            "api.raml",
            "#%RAML 1.0\ntitle: Shop\nversion: v2\nbaseUri: https://shop.example/{version}\nprotocols: [HTTPS]\nuses:\n  lib: lib/common.raml\nsecuritySchemes:\n  oauth:\n    type: OAuth 2.0\n    settings:\n      authorizationUri: https://a/auth\n      accessTokenUri: https://a/token\n      authorizationGrants: [authorization_code]\n      scopes: [orders]\nsecuredBy: [oauth]\n/orders/{orderId}:\n  uriParameters:\n    orderId: integer\n  type: lib.item\n  get:\n    securedBy: [oauth: {scopes: [orders]}, null]\n    responses:\n      200:\n        body:\n          application/json:\n            type: lib.Order\n",
        )
        .with(
            "lib/common.raml",
            "#%RAML 1.0 Library\ntypes:\n  Order:\n    properties:\n      id: integer\n      note?: string | nil\nresourceTypes:\n  item:\n    description: single <<resourcePathName>>\n",
        );
    let report = compile_src(&src, CompileRequest::new("api.raml")).unwrap();
    let doc = &report.document;

    assert_eq!(doc["servers"][0]["url"], "https://shop.example/{version}");
    assert_eq!(doc["servers"][0]["variables"]["version"]["default"], "v2");
    assert_eq!(doc["security"], json!([{ "oauth": [] }]));

    let item = &doc["paths"]["/orders/{orderId}"];
    assert_eq!(item["description"], "single orders");
    assert_eq!(item["parameters"][0]["schema"]["type"], "integer");
    assert_eq!(item["get"]["security"], json!([{ "oauth": ["orders"] }, {}]));
    assert_eq!(
        item["get"]["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/lib.Order"
    );

    let order = &doc["components"]["schemas"]["lib.Order"];
    assert_eq!(order["required"], json!(["id"]));
    assert_eq!(order["properties"]["note"]["nullable"], true);
    assert_eq!(doc["components"]["securitySchemes"]["oauth"]["type"], "oauth2");
    assert_eq!(report.stats.documents, 2);
}

#[test]
fn library_trait_references_resolve_through_the_library_uses() {
    let src = MemorySource::new()
        .with("api.raml", "#%RAML 1.0\ntitle: T\nuses:\n  std: std.raml\n/a:\n  get:\n    is: [std.failing]\n")
        .with(
            "std.raml",
            "#%RAML 1.0 Library\nuses:\n  common: common.raml\ntraits:\n  failing:\n    responses:\n      400:\n        body:\n          application/json:\n            type: common.Error\n",
        )
        .with("common.raml", "#%RAML 1.0 Library\ntypes:\n  Error:\n    properties:\n      code: integer\n");
    let report = compile_src(&src, CompileRequest::new("api.raml")).unwrap();
    let doc = &report.document;
    assert_eq!(
        doc["paths"]["/a"]["get"]["responses"]["400"]["content"]["application/json"]["schema"]["$ref"],
        "#/components/schemas/std.common.Error"
    );
    assert!(doc.pointer("/components/schemas/std.common.Error").is_some());
}

#[test]
fn unqualified_trait_reference_binds_to_its_own_library() {
    let src = MemorySource::new()
        .with(
            "api.raml",
            "#%RAML 1.0\ntitle: T\nuses:\n  a: a.raml\n  b: b.raml\n/x:\n  get:\n    is: [a.failing]\n",
        )
        .with(
            "a.raml",
            "#%RAML 1.0 Library\ntypes:\n  Error:\n    properties:\n      code: integer\ntraits:\n  failing:\n    responses:\n      500:\n        body:\n          application/json:\n            type: Error[]\n",
        )
        .with("b.raml", "#%RAML 1.0 Library\ntypes:\n  Error:\n    properties:\n      message: string\n");
    let report = compile_src(&src, CompileRequest::new("api.raml")).unwrap();
    let schema = &report.document["paths"]["/x"]["get"]["responses"]["500"]["content"]["application/json"]["schema"];
    assert_eq!(schema["type"], "array");
    assert_eq!(schema["items"]["$ref"], "#/components/schemas/a.Error");
}

#[test]
fn root_reference_never_falls_back_to_a_library_type() {
    let src = MemorySource::new()
        .with(
            "api.raml",
            "#%RAML 1.0\ntitle: T\nuses:\n  lib: lib.raml\n/x:\n  get:\n    responses:\n      200:\n        body:\n          application/json:\n            type: Error\n",
        )
        .with("lib.raml", "#%RAML 1.0 Library\ntypes:\n  Error: object\n");
    let err = compile_src(&src, CompileRequest::new("api.raml")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeResolution);
    assert!(err.to_string().contains("`Error`"));
}

#[test]
fn library_trait_security_is_qualified() {
    let src = MemorySource::new()
        .with("api.raml", "#%RAML 1.0\ntitle: T\nuses:\n  lib: lib.raml\n/x:\n  get:\n    is: [lib.guarded]\n")
        .with(
            "lib.raml",
            "#%RAML 1.0 Library\nsecuritySchemes:\n  basic:\n    type: Basic Authentication\ntraits:\n  guarded:\n    securedBy: [basic]\n",
        );
    let report = compile_src(&src, CompileRequest::new("api.raml")).unwrap();
    let doc = &report.document;
    assert_eq!(doc["paths"]["/x"]["get"]["security"], json!([{ "lib.basic": [] }]));
    assert_eq!(doc["components"]["securitySchemes"]["lib.basic"]["scheme"], "basic");
}

#[test]
fn annotation_targets_are_enforced() {
    let declared = "#%RAML 1.0\ntitle: T\nannotationTypes:\n  onlyMethod:\n    type: string\n    allowedTargets: [Method]\n";

    let on_method = format!("{declared}/a:\n  get:\n    (onlyMethod): fine\n");
    single(&on_method).unwrap();

    let on_root = format!("{declared}(onlyMethod): misplaced\n/a:\n  get:\n");
    let err = single(&on_root).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Structure);
    assert_eq!(err.path().unwrap().to_string(), "#/(onlyMethod)");
    assert!(err.to_string().contains("API"));
}

struct DropScheme(&'static str);

impl BuildHook for DropScheme {
    fn name(&self) -> &str {
        "test.drop-scheme"
    }

    fn observes(&self) -> &[NodeKind] {
        &[NodeKind::SecurityScheme]
    }

    fn on_node(&self, node: NodeRef<'_>, _fragment: Option<&Value>, _cx: &mut HookContext<'_>) -> anyhow::Result<HookAction> {
        match node {
            NodeRef::SecurityScheme(scheme) if scheme.name == self.0 => Ok(HookAction::Veto),
            _ => Ok(HookAction::Keep),
        }
    }
}

#[test]
fn vetoed_schemes_are_not_required() {
    let text = "#%RAML 1.0\ntitle: T\nsecuritySchemes:\n  basic:\n    type: Basic Authentication\n  digest:\n    type: Digest Authentication\nsecuredBy: [basic, digest]\n/a:\n  get:\n    securedBy: [basic]\n";
    let src = MemorySource::new().with("api.raml", text);
    let mut host = PluginHost::new();
    host.register(DropScheme("basic")).unwrap();

    let report = compile(&src, &CompileRequest::new("api.raml"), &host).unwrap();
    let doc = &report.document;
    let schemes = doc["components"]["securitySchemes"].as_object().unwrap();
    assert_eq!(schemes.keys().collect::<Vec<_>>(), ["digest"]);
    assert_eq!(doc["security"], json!([{ "digest": [] }]));
    assert!(doc["paths"]["/a"]["get"].get("security").is_none());
}
