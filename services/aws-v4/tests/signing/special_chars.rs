use super::*;
use http::Method;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use pretty_assertions::assert_eq;
use test_case::test_case;

fn canonical_lines(req: &Parts) -> anyhow::Result<(String, String)> {
    let creq = canonical_request_of(req)?;
    let mut lines = creq.lines().skip(1);
    Ok((
        lines.next().unwrap_or_default().to_string(),
        lines.next().unwrap_or_default().to_string(),
    ))
}

#[test_case("/files/a%20b.txt", "/files/a%20b.txt"; "encoded space is kept")]
#[test_case("/files/%7Euser", "/files/%7Euser"; "encoded unreserved is kept")]
#[test_case("/files/a%2Fb", "/files/a%2Fb"; "encoded slash stays in its segment")]
#[test_case("/files/a%2fb", "/files/a%2Fb"; "lower-case escape")]
#[test_case("/files/%E4%B8%AD%E6%96%87", "/files/%E4%B8%AD%E6%96%87"; "utf8")]
#[test_case("/files/a%2520b", "/files/a%2520b"; "literal percent")]
#[tokio::test]
async fn test_encoded_path(path: &str, expected: &str) -> anyhow::Result<()> {
    let mut req = parts(Method::GET, &format!("https://example.amazonaws.com{path}"));
    sign(&mut req, b"").await?;

    assert_eq!(canonical_lines(&req)?.0, expected);
    // The forwarded URI itself is left as it was.
    assert_eq!(req.uri.path(), path);
    assert!(req.headers["authorization"]
        .to_str()?
        .ends_with(&expected_signature(&req)?));
    Ok(())
}

#[tokio::test]
async fn test_fully_encoded_special_characters() -> anyhow::Result<()> {
    let name = "!@#$%^&*()_+-=;:'><,/?.txt";
    let encoded = utf8_percent_encode(name, NON_ALPHANUMERIC).to_string();
    let mut req = parts(
        Method::HEAD,
        &format!("https://example.amazonaws.com/{encoded}"),
    );
    sign(&mut req, b"").await?;

    assert_eq!(
        canonical_lines(&req)?.0,
        "/%21%40%23%24%25%5E%26%2A%28%29%5F%2B%2D%3D%3B%3A%27%3E%3C%2C%2F%3F%2Etxt"
    );
    assert_eq!(canonical_lines(&req)?.0, format!("/{encoded}"));
    Ok(())
}

#[test_case("limit=10", "limit=10"; "single pair")]
#[test_case("b=2&a=1&a=0", "a=0&a=1&b=2"; "sorted by key then value")]
#[test_case("prefix=a%2Fb&empty", "empty=&prefix=a%2Fb"; "empty value")]
#[test_case("q=hello%20world", "q=hello%20world"; "encoded space")]
#[test_case("list-type=2&delimiter=/&encoding-type=url", "delimiter=%2F&encoding-type=url&list-type=2"; "slash in value")]
#[test_case("tag=a+b", "tag=a%2Bb"; "plus is literal")]
#[tokio::test]
async fn test_query(query: &str, expected: &str) -> anyhow::Result<()> {
    let mut req = parts(
        Method::GET,
        &format!("https://example.amazonaws.com/items?{query}"),
    );
    sign(&mut req, b"").await?;

    assert_eq!(canonical_lines(&req)?.1, expected);
    assert_eq!(req.uri.query(), Some(query));
    Ok(())
}
