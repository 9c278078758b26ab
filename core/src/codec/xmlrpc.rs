//! XML-RPC `methodCall` bodies.
//!
//! Parameters are named by position: `param0`, struct members as
//! `param1.member`, array items as `param2[0]`. Only terminal values are
//! exposed; `nil` values carry no data and are skipped.

use std::collections::HashMap;

use log::debug;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{BodyCodec, DecodeError};
use crate::core::params::Parameters;
use crate::core::RequestKind;

const FORMAT: &str = "XML-RPC";

/// Deepest element nesting accepted in a call document.
const MAX_DEPTH: usize = 128;

const SCALAR_TYPES: &[&str] = &[
    "string",
    "int",
    "i4",
    "i8",
    "double",
    "boolean",
    "base64",
    "dateTime.iso8601",
    "nil",
];

/// A decoded XML-RPC value.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlRpcValue {
    /// A scalar; `kind` is `None` for untyped text, which XML-RPC reads as a
    /// string.
    Scalar { kind: Option<String>, text: String },
    Struct(Vec<(String, XmlRpcValue)>),
    Array(Vec<XmlRpcValue>),
}

/// A decoded `methodCall`.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlRpcCall {
    pub method_name: String,
    pub params: Vec<XmlRpcValue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlRpcCodec {
    call: Option<XmlRpcCall>,
}

impl XmlRpcCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// The call decoded last, if any.
    pub fn call(&self) -> Option<&XmlRpcCall> {
        self.call.as_ref()
    }
}

// ── Document tree ───────────────────────────────────────────────────────

#[derive(Debug)]
struct Element {
    name: String,
    children: Vec<Node>,
}

#[derive(Debug)]
enum Node {
    Element(Element),
    Text(String),
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Vec::new(),
        }
    }

    fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Child elements of a container. Text between them may only be
    /// whitespace.
    fn container_children(&self) -> Result<Vec<&Element>, DecodeError> {
        if !self.text().trim().is_empty() {
            return Err(DecodeError::malformed(
                FORMAT,
                format!("unexpected text inside <{}>", self.name),
            ));
        }
        Ok(self.elements().collect())
    }

    /// Text of a leaf element, which may not contain elements.
    fn leaf_text(&self) -> Result<String, DecodeError> {
        if self.elements().next().is_some() {
            return Err(DecodeError::malformed(
                FORMAT,
                format!("unexpected element inside <{}>", self.name),
            ));
        }
        Ok(self.text())
    }

    /// The single child element named `name`.
    fn only_child(&self, name: &str) -> Result<&Element, DecodeError> {
        match self.container_children()?.as_slice() {
            [child] if child.name == name => Ok(*child),
            _ => Err(DecodeError::malformed(
                FORMAT,
                format!("<{}> must contain exactly one <{}>", self.name, name),
            )),
        }
    }
}

fn parse_tree(text: &str) -> Result<Element, DecodeError> {
    let xml_error = |e: quick_xml::Error| DecodeError::malformed(FORMAT, e.to_string());
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    let attach = |stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element| {
        match stack.last_mut() {
            Some(parent) => {
                parent.children.push(Node::Element(element));
                Ok(())
            }
            None if root.is_none() => {
                *root = Some(element);
                Ok(())
            }
            None => Err(DecodeError::malformed(FORMAT, "more than one root element")),
        }
    };

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(DecodeError::malformed(
                        FORMAT,
                        format!("elements nested deeper than {}", MAX_DEPTH),
                    ));
                }
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.push(Element::new(name));
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                attach(&mut stack, &mut root, Element::new(name))?;
            }
            Event::End(e) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| DecodeError::malformed(FORMAT, "unbalanced end tag"))?;
                if element.name.as_bytes() != e.name().as_ref() {
                    return Err(DecodeError::malformed(FORMAT, "mismatched end tag"));
                }
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(t) => {
                let content = t.unescape().map_err(xml_error)?.into_owned();
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Text(content)),
                    None if content.trim().is_empty() => {}
                    None => {
                        return Err(DecodeError::malformed(FORMAT, "text outside the root element"));
                    }
                }
            }
            Event::CData(c) => {
                let content = String::from_utf8_lossy(&c.into_inner()).into_owned();
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Text(content)),
                    None => {
                        return Err(DecodeError::malformed(FORMAT, "CDATA outside the root element"));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DecodeError::malformed(FORMAT, "unclosed element"));
    }
    root.ok_or(DecodeError::NotThisFormat("an XML document"))
}

// ── methodCall interpretation ───────────────────────────────────────────

fn validate_scalar(kind: &str, text: &str) -> Result<(), DecodeError> {
    let trimmed = text.trim();
    let valid = match kind {
        "int" | "i4" => trimmed.parse::<i32>().is_ok(),
        "i8" => trimmed.parse::<i64>().is_ok(),
        "double" => trimmed.parse::<f64>().is_ok(),
        "boolean" => trimmed == "0" || trimmed == "1",
        "nil" => trimmed.is_empty(),
        _ => true,
    };
    if valid {
        Ok(())
    } else {
        Err(DecodeError::malformed(
            FORMAT,
            format!("{:?} is not a valid <{}>", text, kind),
        ))
    }
}

fn parse_value(value: &Element) -> Result<XmlRpcValue, DecodeError> {
    let children: Vec<&Element> = value.elements().collect();
    let typed = match children.as_slice() {
        [] => {
            return Ok(XmlRpcValue::Scalar {
                kind: None,
                text: value.text(),
            });
        }
        [_] => value.container_children()?[0],
        _ => {
            return Err(DecodeError::malformed(FORMAT, "<value> holds more than one value"));
        }
    };

    match typed.name.as_str() {
        "struct" => {
            let mut members = Vec::new();
            for member in typed.container_children()? {
                if member.name != "member" {
                    return Err(DecodeError::malformed(FORMAT, "<struct> may only hold <member>"));
                }
                let parts = member.container_children()?;
                let name = parts
                    .iter()
                    .find(|e| e.name == "name")
                    .ok_or_else(|| DecodeError::malformed(FORMAT, "<member> without <name>"))?
                    .leaf_text()?;
                let inner = parts
                    .iter()
                    .find(|e| e.name == "value")
                    .ok_or_else(|| DecodeError::malformed(FORMAT, "<member> without <value>"))?;
                if parts.len() != 2 {
                    return Err(DecodeError::malformed(FORMAT, "<member> holds unexpected elements"));
                }
                members.push((name, parse_value(inner)?));
            }
            Ok(XmlRpcValue::Struct(members))
        }
        "array" => {
            let data = typed.only_child("data")?;
            let items = data
                .container_children()?
                .into_iter()
                .map(|item| {
                    if item.name == "value" {
                        parse_value(item)
                    } else {
                        Err(DecodeError::malformed(FORMAT, "<data> may only hold <value>"))
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(XmlRpcValue::Array(items))
        }
        kind if SCALAR_TYPES.contains(&kind) => {
            let text = typed.leaf_text()?;
            validate_scalar(kind, &text)?;
            Ok(XmlRpcValue::Scalar {
                kind: Some(kind.to_string()),
                text,
            })
        }
        other => Err(DecodeError::malformed(
            FORMAT,
            format!("unknown value type <{}>", other),
        )),
    }
}

fn parse_call(root: &Element) -> Result<XmlRpcCall, DecodeError> {
    if root.name != "methodCall" {
        return Err(DecodeError::NotThisFormat("an XML-RPC methodCall document"));
    }

    let mut method_name = None;
    let mut params = Vec::new();
    let mut seen_params = false;
    for child in root.container_children()? {
        match child.name.as_str() {
            "methodName" if method_name.is_none() => {
                let name = child.leaf_text()?.trim().to_string();
                if name.is_empty() {
                    return Err(DecodeError::malformed(FORMAT, "empty <methodName>"));
                }
                method_name = Some(name);
            }
            "params" if !seen_params => {
                seen_params = true;
                for param in child.container_children()? {
                    if param.name != "param" {
                        return Err(DecodeError::malformed(FORMAT, "<params> may only hold <param>"));
                    }
                    params.push(parse_value(param.only_child("value")?)?);
                }
            }
            other => {
                return Err(DecodeError::malformed(
                    FORMAT,
                    format!("unexpected <{}> in <methodCall>", other),
                ));
            }
        }
    }

    let method_name =
        method_name.ok_or_else(|| DecodeError::malformed(FORMAT, "missing <methodName>"))?;
    Ok(XmlRpcCall {
        method_name,
        params,
    })
}

// ── Flattening ──────────────────────────────────────────────────────────

/// Visits every non-nil scalar with its parameter name, in document order.
fn visit_leaves(value: &XmlRpcValue, path: &str, visit: &mut dyn FnMut(&str, &str)) {
    match value {
        XmlRpcValue::Scalar { kind, text } => {
            if kind.as_deref() != Some("nil") {
                visit(path, text);
            }
        }
        XmlRpcValue::Struct(members) => {
            for (name, member) in members {
                visit_leaves(member, &format!("{}.{}", path, name), visit);
            }
        }
        XmlRpcValue::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                visit_leaves(item, &format!("{}[{}]", path, index), visit);
            }
        }
    }
}

fn flatten(call: &XmlRpcCall) -> Parameters {
    let mut params = Parameters::new();
    for (index, value) in call.params.iter().enumerate() {
        visit_leaves(value, &format!("param{}", index), &mut |name: &str, text: &str| {
            params.append(name, text);
        });
    }
    params
}

/// Writes new scalar texts into `value`, taking them in document order from
/// `queues` keyed by parameter name.
fn substitute(value: &mut XmlRpcValue, path: &str, queues: &mut HashMap<String, Vec<String>>) {
    match value {
        XmlRpcValue::Scalar { kind, text } => {
            if kind.as_deref() == Some("nil") {
                return;
            }
            if let Some(queue) = queues.get_mut(path) {
                if !queue.is_empty() {
                    *text = queue.remove(0);
                }
            }
        }
        XmlRpcValue::Struct(members) => {
            for (name, member) in members.iter_mut() {
                substitute(member, &format!("{}.{}", path, name), queues);
            }
        }
        XmlRpcValue::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                substitute(item, &format!("{}[{}]", path, index), queues);
            }
        }
    }
}

fn write_value(out: &mut String, value: &XmlRpcValue) {
    out.push_str("<value>");
    match value {
        XmlRpcValue::Scalar { kind: None, text } => out.push_str(&escape(text.as_str())),
        XmlRpcValue::Scalar { kind: Some(kind), text } if kind == "nil" && text.is_empty() => {
            out.push_str("<nil/>");
        }
        XmlRpcValue::Scalar { kind: Some(kind), text } => {
            out.push_str(&format!("<{k}>{t}</{k}>", k = kind, t = escape(text.as_str())));
        }
        XmlRpcValue::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        XmlRpcValue::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
    }
    out.push_str("</value>");
}

fn write_call(call: &XmlRpcCall) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall>\n<methodName>");
    out.push_str(&escape(call.method_name.as_str()));
    out.push_str("</methodName>\n<params>\n");
    for value in &call.params {
        out.push_str("<param>");
        write_value(&mut out, value);
        out.push_str("</param>\n");
    }
    out.push_str("</params>\n</methodCall>\n");
    out
}

impl BodyCodec for XmlRpcCodec {
    fn kind(&self) -> RequestKind {
        RequestKind::XmlRpc
    }

    fn decode(&mut self, body: &[u8]) -> Result<Parameters, DecodeError> {
        let text = std::str::from_utf8(body).map_err(|_| DecodeError::InvalidUtf8)?;
        if !text.trim_start().starts_with('<') {
            return Err(DecodeError::NotThisFormat("an XML document"));
        }

        let call = parse_call(&parse_tree(text)?)?;
        let params = flatten(&call);
        debug!(
            "Decoded XML-RPC call {} with {} parameter(s)",
            call.method_name,
            params.len()
        );

        self.call = Some(call);
        Ok(params)
    }

    fn encode(&self, params: &Parameters) -> Result<Vec<u8>, DecodeError> {
        let mut call = self.call.clone().ok_or(DecodeError::NotDecoded(FORMAT))?;

        let known = flatten(&call);
        let mut queues = HashMap::new();
        for (key, values) in params.iter() {
            if !known.contains_key(key) {
                return Err(DecodeError::UnknownParameter {
                    format: FORMAT,
                    name: key.to_string(),
                });
            }
            queues.insert(key.to_string(), values.to_vec());
        }

        for (index, value) in call.params.iter_mut().enumerate() {
            substitute(value, &format!("param{}", index), &mut queues);
        }
        Ok(write_call(&call).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_METHODS: &str = "<methodCall>
            <methodName>system.listMethods</methodName>
            <params></params>
        </methodCall>";

    const RICH_CALL: &str = r#"<?xml version="1.0"?>
<methodCall>
  <methodName>blog.post</methodName>
  <params>
    <param><value><string>hello &amp; bye</string></value></param>
    <param><value><int>42</int></value></param>
    <param><value>
      <struct>
        <member><name>title</name><value>untyped</value></member>
        <member><name>tags</name><value><array><data>
          <value><string>a</string></value>
          <value><base64>Yg==</base64></value>
        </data></array></value></member>
        <member><name>extra</name><value><nil/></value></member>
      </struct>
    </value></param>
  </params>
</methodCall>"#;

    #[test]
    fn test_decode_without_params() {
        let mut codec = XmlRpcCodec::new();
        let params = codec.decode(LIST_METHODS.as_bytes()).unwrap();
        assert!(params.is_empty());
        assert_eq!(codec.call().unwrap().method_name, "system.listMethods");
    }

    #[test]
    fn test_decode_nested_values() {
        let params = XmlRpcCodec::new().decode(RICH_CALL.as_bytes()).unwrap();
        assert_eq!(
            params,
            Parameters::from(vec![
                ("param0", vec!["hello & bye"]),
                ("param1", vec!["42"]),
                ("param2.title", vec!["untyped"]),
                ("param2.tags[0]", vec!["a"]),
                ("param2.tags[1]", vec!["Yg=="]),
            ])
        );
    }

    #[test]
    fn test_decode_rejects_other_documents() {
        let not_xml = XmlRpcCodec::new().decode(br#"{"1":"2"}"#);
        assert_eq!(not_xml, Err(DecodeError::NotThisFormat("an XML document")));

        let other_root = XmlRpcCodec::new().decode(b"<methodResponse><params/></methodResponse>");
        assert_eq!(
            other_root,
            Err(DecodeError::NotThisFormat("an XML-RPC methodCall document"))
        );
    }

    #[test]
    fn test_decode_rejects_malformed_calls() {
        let cases: &[&[u8]] = &[
            b"<methodCall><methodName>a</methodName>",
            b"<methodCall><params></params></methodCall>",
            b"<methodCall><methodName> </methodName></methodCall>",
            b"<methodCall><methodName>a</methodName><bogus/></methodCall>",
            b"<methodCall><methodName>a</methodName><params><param><value><int>x</int></value></param></params></methodCall>",
            b"<methodCall><methodName>a</methodName><params><param><value><float>1</float></value></param></params></methodCall>",
            b"<methodCall><methodName>a</methodName></methodCall><methodCall/>",
            b"<methodCall><methodName>a</wrong></methodCall>",
        ];
        for case in cases {
            let result = XmlRpcCodec::new().decode(case);
            assert!(
                matches!(result, Err(DecodeError::Malformed { .. })),
                "expected malformed for {:?}, got {:?}",
                String::from_utf8_lossy(case),
                result
            );
        }
    }

    fn nested_arrays(depth: usize) -> String {
        let mut body = String::from("<methodCall><methodName>a</methodName><params><param>");
        body.push_str(&"<value><array><data>".repeat(depth));
        body.push_str("<value>x</value>");
        body.push_str(&"</data></array></value>".repeat(depth));
        body.push_str("</param></params></methodCall>");
        body
    }

    #[test]
    fn test_decode_rejects_deep_nesting() {
        for depth in [2000, 10000] {
            let result = XmlRpcCodec::new().decode(nested_arrays(depth).as_bytes());
            assert!(matches!(result, Err(DecodeError::Malformed { .. })), "depth {}", depth);
        }
    }

    #[test]
    fn test_decode_accepts_moderate_nesting() {
        let params = XmlRpcCodec::new().decode(nested_arrays(10).as_bytes()).unwrap();
        assert_eq!(params.get(&format!("param0{}", "[0]".repeat(10))), Some("x"));
    }

    #[test]
    fn test_encode_substitutes_values() {
        let mut codec = XmlRpcCodec::new();
        let mut params = codec.decode(RICH_CALL.as_bytes()).unwrap();
        params.insert("param0", vec!["<script>".to_string()]);
        params.insert("param2.tags[0]", vec!["b".to_string()]);

        let body = codec.encode(&params).unwrap();
        let text = String::from_utf8(body.clone()).unwrap();
        assert!(text.contains("<string>&lt;script&gt;</string>"));
        assert!(text.contains("<nil/>"));

        let mut again = XmlRpcCodec::new();
        assert_eq!(again.decode(&body).unwrap(), params);
        assert_eq!(again.call().unwrap().method_name, "blog.post");
    }

    #[test]
    fn test_encode_unknown_parameter() {
        let mut codec = XmlRpcCodec::new();
        codec.decode(LIST_METHODS.as_bytes()).unwrap();
        let params = Parameters::from(vec![("param0", vec!["x"])]);
        assert!(matches!(
            codec.encode(&params),
            Err(DecodeError::UnknownParameter { .. })
        ));
    }
}
