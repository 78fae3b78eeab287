//! Builds the default XML search document posted to the archive's search
//! endpoint when no query file is configured.

use crate::source::SourceError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// (field id, CSV header) pairs for every catalog column, in response
/// column order.
const SEARCH_FIELDS: [(&str, &str); 12] = [
    ("xnat:ctScanData/PROJECT", "project"),
    ("xnat:ctScanData/SUBJECT_ID", "subject_id"),
    ("xnat:ctScanData/SESSION_ID", "session_id"),
    ("xnat:ctScanData/SESSION_LABEL", "session_label"),
    ("xnat:ctScanData/ID", "id"),
    ("xnat:ctScanData/NOTE", "note"),
    ("xnat:ctScanData/PARAMETERS_ORIENTATION", "parameters_orientation"),
    ("xnat:ctScanData/FRAMES_BODYPARTEXAMINED", "frames_bodypartexamined"),
    ("xnat:ctScanData/PARAMETERS_IMAGETYPE", "parameters_imagetype"),
    ("xnat:ctScanData/UID", "uid"),
    ("xnat:ctScanData/SERIES_DESCRIPTION", "series_description"),
    ("xnat:ctScanData/QUARANTINE_STATUS", "quarantine_status"),
];

const ROOT_ELEMENT: &str = "xnat:ctScanData";

/// The search document listing every CT scan the account can read, with
/// one search field per catalog column.
pub fn default_search_document() -> Result<Vec<u8>, SourceError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut search = BytesStart::new("xdat:search");
    search.push_attribute(("xmlns:xdat", "http://nrg.wustl.edu/security"));
    search.push_attribute(("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"));
    writer.write_event(Event::Start(search))?;

    text_element(&mut writer, "xdat:root_element_name", ROOT_ELEMENT)?;

    for (sequence, (field_id, header)) in SEARCH_FIELDS.iter().enumerate() {
        writer.write_event(Event::Start(BytesStart::new("xdat:search_field")))?;
        text_element(&mut writer, "xdat:element_name", ROOT_ELEMENT)?;
        text_element(&mut writer, "xdat:field_ID", field_id)?;
        text_element(&mut writer, "xdat:sequence", &sequence.to_string())?;
        text_element(&mut writer, "xdat:type", "string")?;
        text_element(&mut writer, "xdat:header", header)?;
        writer.write_event(Event::End(BytesEnd::new("xdat:search_field")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("xdat:search")))?;
    Ok(writer.into_inner())
}

fn text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    text: &str,
) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
