//! Nested record lists carried inside a single argument.
//!
//! Records are terminated by `;` and their fields are separated by `%`, e.g.
//! `1%Melee%5;2%Magic%3;`. Field values must not contain either delimiter.

pub const RECORD_TERMINATOR: char = ';';
pub const FIELD_SEPARATOR: char = '%';

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordList {
    out: String,
}

impl RecordList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<I, T>(&mut self, fields: I)
    where
        I: IntoIterator<Item = T>,
        T: std::fmt::Display,
    {
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                self.out.push(FIELD_SEPARATOR);
            }
            self.out.push_str(&field.to_string());
        }
        self.out.push(RECORD_TERMINATOR);
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Builds a single-field record list, such as a character name list.
pub fn join_names<I, T>(names: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut list = RecordList::new();
    for name in names {
        list.push([name.as_ref()]);
    }
    list.finish()
}

/// Splits a record list back into its records and fields.
pub fn parse(list: &str) -> Vec<Vec<String>> {
    list.split(RECORD_TERMINATOR)
        .filter(|record| !record.is_empty())
        .map(|record| record.split(FIELD_SEPARATOR).map(str::to_string).collect())
        .collect()
}

/// True when `value` can be used as a field without breaking the list framing.
pub fn is_field_safe(value: &str) -> bool {
    !value.contains(RECORD_TERMINATOR) && !value.contains(FIELD_SEPARATOR)
}
