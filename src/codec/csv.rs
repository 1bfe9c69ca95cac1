//! CSV export format (spec.md S:4.5): header row `key,data` or
//! `key,term,cmd,data`; fields containing a comma, double quote, CR, or LF
//! are quoted with embedded quotes doubled. Import is not implemented; the
//! contract allows CSV import to report [`KvError::NotSupported`].

use crate::backend::Record;
use crate::codec::{bytes_to_latin1_string, ExportOptions};
use crate::error::Result;

fn needs_quoting(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\r') || field.contains('\n')
}

fn quote_field(field: &str) -> String {
    if needs_quoting(field) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub(super) fn encode(
    records: &[Record],
    options: ExportOptions,
    poll: &mut impl FnMut(u64) -> Result<()>,
) -> Result<Vec<u8>> {
    let mut out = String::new();
    if options.include_metadata {
        out.push_str("key,term,cmd,data\n");
    } else {
        out.push_str("key,data\n");
    }

    for (i, record) in records.iter().enumerate() {
        let data_field = quote_field(&bytes_to_latin1_string(&record.data));
        if options.include_metadata {
            out.push_str(&format!(
                "{},{},{},{}\n",
                record.id, record.term, record.cmd, data_field
            ));
        } else {
            out.push_str(&format!("{},{}\n", record.id, data_field));
        }
        poll((i + 1) as u64)?;
    }
    Ok(out.into_bytes())
}
