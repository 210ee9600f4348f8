use crate::types::PhysioError;

/// One meaningful line of a physiological log file.
///
/// The same grammar covers every log kind: after stripping a trailing
/// `#` comment and surrounding whitespace, a line is either a `key = value`
/// assignment or a whitespace-delimited data row. Blank lines and the
/// column-header row (recognized by a non-numeric leading token) produce
/// no event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineEvent<'a> {
    /// A `key = value` metadata assignment
    Assignment { key: &'a str, value: &'a str },
    /// A tabular data row
    Data(DataRow<'a>),
}

/// A data row, right-padded with `"0"` to five fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DataRow<'a> {
    /// The five column values, padded where the line had fewer
    pub fields: [&'a str; 5],
    /// How many fields the line physically carried (at most 5)
    pub present: usize,
}

impl<'a> DataRow<'a> {
    /// Parses one field as a signed tick count or index.
    pub fn int_field(&self, index: usize, what: &'static str) -> Result<i64, PhysioError> {
        self.fields[index]
            .parse::<i64>()
            .map_err(|_| PhysioError::InvalidValue {
                what,
                value: self.fields[index].to_string(),
            })
    }
}

/// Tokenizes one raw line, or returns `None` if it carries no event.
pub(crate) fn parse_line(line: &str) -> Option<LineEvent<'_>> {
    // Strip any trailing comment, then leading and trailing whitespace
    let line = match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    };
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    // An assigned value; split on the first '=' and trim both sides
    if let Some(pos) = line.find('=') {
        return Some(LineEvent::Assignment {
            key: line[..pos].trim(),
            value: line[pos + 1..].trim(),
        });
    }

    // This must be data; it is 3-5 columns, padded to always have 5
    let mut fields = ["0"; 5];
    let mut present = 0;
    for (index, field) in line.split_whitespace().take(5).enumerate() {
        fields[index] = field;
        present = index + 1;
    }

    // If the first column isn't numeric, it is probably the header
    if !fields[0].bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(LineEvent::Data(DataRow { fields, present }))
}

/// Iterates over the events of a whole log buffer.
pub(crate) fn events(text: &str) -> impl Iterator<Item = LineEvent<'_>> {
    text.lines().filter_map(parse_line)
}
