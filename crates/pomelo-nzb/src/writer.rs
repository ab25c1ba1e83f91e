//! NZB writer, the inverse of [`crate::reader`].

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};

use crate::error::NzbError;
use crate::model::Nzb;

const DOCTYPE: &str = r#"nzb PUBLIC "-//newzbin//DTD NZB 1.1//EN" "http://www.newzbin.com/DTD/nzb/nzb-1.1.dtd""#;
const XMLNS: &str = "http://www.newzbin.com/DTD/2003/nzb";

/// Serialize a manifest to indented XML. Text and attribute values are
/// escaped, so the result round-trips through [`crate::reader::read`].
pub fn write(nzb: &Nzb) -> Result<String, NzbError> {
    emit(nzb).map_err(|e| NzbError::Xml(e.to_string()))
}

fn emit(nzb: &Nzb) -> std::io::Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))?;

    let mut root = BytesStart::new("nzb");
    root.push_attribute(("xmlns", XMLNS));
    writer.write_event(Event::Start(root))?;

    write_head(&mut writer, nzb)?;
    for file in &nzb.files {
        write_file(&mut writer, file)?;
    }

    writer.write_event(Event::End(BytesStart::new("nzb").to_end()))?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

fn write_head(writer: &mut Writer<Vec<u8>>, nzb: &Nzb) -> std::io::Result<()> {
    let meta = &nzb.meta;
    let mut entries: Vec<(&str, &str)> = Vec::new();
    if let Some(title) = &meta.title {
        entries.push(("title", title));
    }
    if let Some(password) = &meta.password {
        entries.push(("password", password));
    }
    if let Some(category) = &meta.category {
        entries.push(("category", category));
    }
    for tag in &meta.tags {
        entries.push(("tag", tag));
    }
    for (key, value) in &meta.extra {
        entries.push((key, value));
    }
    if entries.is_empty() {
        return Ok(());
    }

    writer
        .create_element("head")
        .write_inner_content(|writer| {
            for (key, value) in entries {
                writer
                    .create_element("meta")
                    .with_attribute(("type", key))
                    .write_text_content(BytesText::new(value))?;
            }
            Ok(())
        })?;
    Ok(())
}

fn write_file(writer: &mut Writer<Vec<u8>>, file: &crate::model::NzbFile) -> std::io::Result<()> {
    let date = file.date.to_string();
    writer
        .create_element("file")
        .with_attribute(("poster", file.poster.as_str()))
        .with_attribute(("date", date.as_str()))
        .with_attribute(("subject", file.subject.as_str()))
        .write_inner_content(|writer| {
            writer
                .create_element("groups")
                .write_inner_content(|writer| {
                    for group in &file.groups {
                        writer
                            .create_element("group")
                            .write_text_content(BytesText::new(group))?;
                    }
                    Ok(())
                })?;
            writer
                .create_element("segments")
                .write_inner_content(|writer| {
                    for segment in &file.segments {
                        let bytes = segment.bytes.to_string();
                        let number = segment.number.to_string();
                        writer
                            .create_element("segment")
                            .with_attribute(("bytes", bytes.as_str()))
                            .with_attribute(("number", number.as_str()))
                            .write_text_content(BytesText::new(&segment.message_id))?;
                    }
                    Ok(())
                })?;
            Ok(())
        })?;
    Ok(())
}
