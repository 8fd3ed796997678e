//! Attribute extraction from NextBus-style XML bodies.
//!
//! Both feeds are a `<body>` holding zero or more sibling elements whose data
//! lives entirely in attributes. A body may hold one element, many, or none;
//! all three come back as a `Vec`.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{FeedError, FeedResult};

pub type Attributes = HashMap<String, String>;

/// Returns the attributes of every `element` in `xml`, in document order.
///
/// Elements with malformed attributes are skipped. An `<Error>` element in
/// the body means the feed rejected the request and is returned as
/// [`FeedError::Reported`].
pub fn elements(xml: &str, element: &str) -> FeedResult<Vec<Attributes>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut found = Vec::new();
    let mut in_error = false;
    let mut reported: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if e.local_name().as_ref() == b"Error" {
                    in_error = true;
                    reported.get_or_insert_with(String::new);
                } else if e.local_name().as_ref() == element.as_bytes() {
                    push_attributes(&mut found, &e);
                }
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"Error" {
                    reported.get_or_insert_with(String::new);
                } else if e.local_name().as_ref() == element.as_bytes() {
                    push_attributes(&mut found, &e);
                }
            }
            Event::Text(t) if in_error => {
                if let Some(message) = reported.as_mut() {
                    message.push_str(t.unescape()?.trim());
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"Error" => in_error = false,
            Event::Eof => break,
            _ => {}
        }
    }

    match reported {
        Some(message) => Err(FeedError::Reported(message)),
        None => Ok(found),
    }
}

fn push_attributes(found: &mut Vec<Attributes>, e: &BytesStart<'_>) {
    match attributes(e) {
        Ok(attrs) => found.push(attrs),
        Err(err) => debug!(error = %err, "Skipping element with malformed attributes"),
    }
}

fn attributes(e: &BytesStart<'_>) -> FeedResult<Attributes> {
    let mut attrs = Attributes::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}
