//! RFC 6265 Cookie Compliance Tests
//!
//! https://www.rfc-editor.org/rfc/rfc6265

use chrono::{TimeZone, Utc};
use hopper::cookie::{Cookie, CookieJar, CookieStore};

#[test]
fn test_secure_flag_enforcement_rfc6265_section_5_4() {
    let jar = CookieJar::new();
    jar.set_cookie("secure_cookie=val; Secure", "https://example.com/");

    assert!(
        jar.cookie_string("http://example.com/foo").is_none(),
        "Secure cookie MUST NOT be sent to http"
    );
    assert_eq!(
        jar.cookie_string("https://example.com/foo").as_deref(),
        Some("secure_cookie=val")
    );
}

#[test]
fn test_cookie_parsing_rfc6265_section_5_2() {
    let url = "http://example.com/test";

    let c = Cookie::parse("SID=31d4d96e407aad42", url).unwrap();
    assert_eq!(c.name, "SID");
    assert_eq!(c.value, "31d4d96e407aad42");
    assert_eq!(c.domain, "example.com");
    assert!(c.host_only);
    // 5.1.4: default path for /test is /
    assert_eq!(c.path, "/");

    let c = Cookie::parse(
        "SID=31d4d96e407aad42; Path=/; Domain=example.com; Secure; HttpOnly",
        url,
    )
    .unwrap();
    assert_eq!(c.path, "/");
    assert_eq!(c.domain, "example.com");
    assert!(!c.host_only);
    assert!(c.secure);
    assert!(c.http_only);
}

#[test]
fn test_default_path_rfc6265_section_5_1_4() {
    let c = Cookie::parse("a=b", "http://example.com/docs/guide/page").unwrap();
    assert_eq!(c.path, "/docs/guide");

    // Path attributes not starting with "/" fall back to the default.
    let c = Cookie::parse("a=b; Path=relative", "http://example.com/docs/page").unwrap();
    assert_eq!(c.path, "/docs");
}

#[test]
fn test_date_formats_rfc6265_section_5_1_1() {
    let url = "http://example.com";
    let expected = Utc.timestamp_opt(784111777, 0).unwrap();

    // RFC 1123
    let c = Cookie::parse("a=b; Expires=Sun, 06 Nov 1994 08:49:37 GMT", url).unwrap();
    assert_eq!(c.expires, Some(expected));

    // RFC 850
    let c = Cookie::parse("a=b; Expires=Sunday, 06-Nov-94 08:49:37 GMT", url).unwrap();
    assert_eq!(c.expires, Some(expected));

    // ANSI C asctime()
    let c = Cookie::parse("a=b; Expires=Sun Nov  6 08:49:37 1994", url).unwrap();
    assert_eq!(c.expires, Some(expected));
}

#[test]
fn test_max_age_precedence_rfc6265_section_5_3() {
    let c = Cookie::parse(
        "a=b; Expires=Sun, 06 Nov 1994 08:49:37 GMT; Max-Age=3600",
        "http://example.com/",
    )
    .unwrap();
    assert!(!c.is_expired());
    assert!(c.expires.unwrap() > Utc::now());
}

#[test]
fn test_domain_matching_rfc6265_section_5_1_3() {
    let jar = CookieJar::new();
    jar.set_cookie("a=b; Domain=example.com", "http://www.example.com/");

    assert!(jar.cookie_string("http://example.com/").is_some());
    assert!(jar.cookie_string("http://foo.example.com/").is_some());
    assert!(jar.cookie_string("http://example.org/").is_none());
    assert!(jar.cookie_string("http://notexample.com/").is_none());
}

#[test]
fn test_domain_attribute_must_cover_host_rfc6265_section_5_3() {
    assert!(Cookie::parse("a=b; Domain=other.com", "http://example.com/").is_err());
    assert!(Cookie::parse("a=b; Domain=www.example.com", "http://example.com/").is_err());
}

#[test]
fn test_path_matching_rfc6265_section_5_1_4() {
    let jar = CookieJar::new();
    jar.set_cookie("a=b; Path=/foo", "http://example.com/");

    assert!(jar.cookie_string("http://example.com/foo").is_some());
    assert!(jar.cookie_string("http://example.com/foo/bar").is_some());
    assert!(jar.cookie_string("http://example.com/foo/").is_some());
    assert!(jar.cookie_string("http://example.com/bar").is_none());
    // Partial prefix but not a directory component
    assert!(jar.cookie_string("http://example.com/fo").is_none());
    assert!(jar.cookie_string("http://example.com/foobar").is_none());
}

#[test]
fn test_cookie_jar_ordering_rfc6265_section_5_4() {
    let jar = CookieJar::new();
    let url = "http://example.com/foo";

    jar.set_cookie("SID=123; Path=/foo", url);
    jar.set_cookie("SID=456; Path=/", url);
    assert_eq!(jar.len(), 2);

    // Longer paths are listed first (5.4.2).
    assert_eq!(jar.cookie_string(url).as_deref(), Some("SID=123; SID=456"));
}

#[test]
fn test_replacement_and_deletion_rfc6265_section_5_3() {
    let jar = CookieJar::new();
    let url = "http://example.com/";

    jar.set_cookie("token=old", url);
    jar.set_cookie("token=new", url);
    assert_eq!(jar.len(), 1);
    assert_eq!(jar.get("example.com", "token").unwrap().value, "new");

    jar.set_cookie("token=gone; Expires=Thu, 01 Jan 1970 00:00:00 GMT", url);
    assert!(jar.is_empty());
}
