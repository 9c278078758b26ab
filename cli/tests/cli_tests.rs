use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fn raw_file(content: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content).unwrap();
    file
}

/// A bodyless request is classified from its query string.
#[test]
fn test_query_string_url() {
    cargo_bin_cmd!("fuzzreq")
        .args(["http://example.com/search?id=1&q=test"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Query-String Request"))
        .stdout(predicate::str::contains("id"))
        .stdout(predicate::str::contains("test"));
}

/// Method, header and body flags are combined into one request.
#[test]
fn test_json_post_from_flags() {
    cargo_bin_cmd!("fuzzreq")
        .args([
            "http://example.com/api",
            "-X",
            "POST",
            "-H",
            "Content-Type: application/json",
            "-d",
            r#"{"user":{"name":"john"}}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("JSON Post Data Request"))
        .stdout(predicate::str::contains("user.name"));
}

/// A body without a content type that is not XML-RPC is not fuzzable.
#[test]
fn test_unclassifiable_request_exits_with_2() {
    cargo_bin_cmd!("fuzzreq")
        .args(["http://example.com/", "-X", "POST", "-d", "a=b"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("not a fuzzable request"));
}

/// Multipart bodies are read from a raw request dump.
#[test]
fn test_raw_multipart_request() {
    let file = raw_file(
        b"POST /upload HTTP/1.1\r\n\
          Host: example.com\r\n\
          Content-Type: multipart/form-data; boundary=XyZ\r\n\
          \r\n\
          --XyZ\r\n\
          Content-Disposition: form-data; name=\"a\"\r\n\
          \r\n\
          bcd\r\n\
          --XyZ--\r\n",
    );
    let path = file.path().to_str().unwrap().to_string();

    cargo_bin_cmd!("fuzzreq")
        .args(["-r", &path, "--scheme", "http"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Multipart Request"))
        .stdout(predicate::str::contains("http://example.com/upload"))
        .stdout(predicate::str::contains("bcd"));
}

/// Every file named in a list is classified; relative names resolve next to
/// the list.
#[test]
fn test_list_file_json_output() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("form.txt"),
        b"POST /login HTTP/1.1\r\nHost: example.com\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\nuser=admin&pass=x",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("rpc.txt"),
        b"POST /RPC2 HTTP/1.1\r\nHost: example.com\r\n\r\n<methodCall><methodName>demo.echo</methodName><params><param><value><string>hi</string></value></param></params></methodCall>",
    )
    .unwrap();
    let list = dir.path().join("requests.txt");
    std::fs::write(&list, "# captured requests\nform.txt\n\nrpc.txt\n").unwrap();

    cargo_bin_cmd!("fuzzreq")
        .args(["-l", list.to_str().unwrap(), "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""kind":"UrlEncoded""#))
        .stdout(predicate::str::contains(r#""kind":"XmlRpc""#))
        .stdout(predicate::str::contains(r#""param0":["hi"]"#));
}

/// --curl rebuilds the request from the decoded parameters.
#[test]
fn test_curl_output() {
    cargo_bin_cmd!("fuzzreq")
        .args([
            "http://example.com/login",
            "-X",
            "POST",
            "-H",
            "Content-Type: application/x-www-form-urlencoded",
            "-d",
            "user=admin",
            "--curl",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "curl -X POST 'http://example.com/login' -H 'Content-Type: application/x-www-form-urlencoded' --data-binary 'user=admin'",
        ));
}

/// A missing raw file is an I/O error, not a classification failure.
#[test]
fn test_missing_raw_file_exits_with_1() {
    cargo_bin_cmd!("fuzzreq")
        .args(["-r", "/nonexistent/request.txt"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to read"));
}

/// Running with no arguments should fail (clap requires a URL, -r or -l).
#[test]
fn test_no_args_shows_error() {
    cargo_bin_cmd!("fuzzreq")
        .assert()
        .failure();
}
