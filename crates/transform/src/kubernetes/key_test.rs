use super::*;

fn tag(s: &str) -> Tag {
    Tag::new(s).unwrap()
}

#[test]
fn test_segments_namespace_and_name() {
    let parser = TagParser::segments("svc.", '.');
    let parsed = parser.parse(&tag("svc.default.alpha-container")).unwrap();

    assert_eq!(parsed.key, MetadataKey::new("default", "alpha-container"));
    assert_eq!(parsed.container, None);
}

#[test]
fn test_segments_with_container() {
    let parser = TagParser::segments("kube.", '.');
    let parsed = parser.parse(&tag("kube.prod.web-7d9c.nginx.sidecar")).unwrap();

    assert_eq!(parsed.key.namespace(), "prod");
    assert_eq!(parsed.key.name(), "web-7d9c");
    assert_eq!(parsed.container.as_deref(), Some("nginx.sidecar"));
}

#[test]
fn test_segments_errors() {
    let parser = TagParser::segments("kube.", '.');

    assert_eq!(
        parser.parse(&tag("syslog.auth")).unwrap_err(),
        KeyParseError::MissingPrefix("kube.".into())
    );
    assert_eq!(
        parser.parse(&tag("kube.")).unwrap_err(),
        KeyParseError::MissingSegment("namespace")
    );
    assert_eq!(
        parser.parse(&tag("kube.default")).unwrap_err(),
        KeyParseError::MissingSegment("name")
    );
    assert_eq!(
        parser.parse(&tag("kube.default.")).unwrap_err(),
        KeyParseError::MissingSegment("name")
    );
}

#[test]
fn test_containers_share_key() {
    let parser = TagParser::segments("kube.", '.');
    let a = parser.parse(&tag("kube.ns.pod.app")).unwrap();
    let b = parser.parse(&tag("kube.ns.pod.proxy")).unwrap();

    assert_eq!(a.key, b.key);
    assert_ne!(a.container, b.container);
}

#[test]
fn test_regex_parser() {
    let parser = TagParser::regex(
        r"^kube\.var\.log\.containers\.(?<pod_name>[^_]+)_(?<namespace>[^_]+)_(?<container>.+)\.log$",
    )
    .unwrap();
    let parsed = parser
        .parse(&tag("kube.var.log.containers.web-1_prod_nginx.log"))
        .unwrap();

    assert_eq!(parsed.key, MetadataKey::new("prod", "web-1"));
    assert_eq!(parsed.container.as_deref(), Some("nginx"));

    assert_eq!(
        parser.parse(&tag("kube.other")).unwrap_err(),
        KeyParseError::NoMatch
    );
}

#[test]
fn test_regex_requires_groups() {
    assert!(TagParser::regex(r"^(?<name>.+)$").is_err());
    assert!(TagParser::regex(r"^(?<namespace>.+)$").is_err());
    assert!(TagParser::regex(r"^(?<namespace>[^.]+)\.(?<name>.+)$").is_ok());
    assert!(TagParser::regex(r"(?<namespace>").is_err());
}

#[test]
fn test_key_display() {
    assert_eq!(MetadataKey::new("prod", "web-1").to_string(), "prod/web-1");
}

#[test]
fn test_identity_fields() {
    let parser = TagParser::segments("kube.", '.');

    let fields = parser.parse(&tag("kube.prod.web-1.nginx")).unwrap().identity_fields();
    assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["namespace", "name", "container"]);
    assert_eq!(fields.get("container").and_then(|v| v.as_str()), Some("nginx"));

    let fields = parser.parse(&tag("kube.prod.web-1")).unwrap().identity_fields();
    assert_eq!(fields.len(), 2);
    assert!(!fields.contains_key("container"));
}
