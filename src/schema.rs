//! Column mapping between source headers and the fields the pipeline reads.
//!
//! The mapping is resolved once per input file against its header row, so the
//! rest of the pipeline never needs to know which alias a file used.

use crate::error::PipelineError;

/// Fields the normalizer reads from each row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Village,
    MeasuredAt,
    Age,
    Status,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Village, Field::MeasuredAt, Field::Age, Field::Status];

    pub fn label(self) -> &'static str {
        match self {
            Field::Village => "village",
            Field::MeasuredAt => "measurement date",
            Field::Age => "age",
            Field::Status => "nutrition status",
        }
    }

    /// Only the measurement date is required; the pipeline halts without it
    pub fn is_required(self) -> bool {
        matches!(self, Field::MeasuredAt)
    }
}

/// Accepted header names per field, in priority order
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    aliases: Vec<(Field, Vec<String>)>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        let aliases = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            aliases: vec![
                (Field::Village, aliases(&["Desa_Kel"])),
                (
                    Field::MeasuredAt,
                    aliases(&["Tanggal_Pengukuran", "Tanggal Pengukuran"]),
                ),
                (Field::Age, aliases(&["Usia_Saat_Ukur"])),
                (Field::Status, aliases(&["Status_Gizi"])),
            ],
        }
    }
}

impl ColumnMapping {
    /// Add an extra accepted header name for a field (lowest priority)
    pub fn with_alias(mut self, field: Field, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        match self.aliases.iter_mut().find(|(f, _)| *f == field) {
            Some((_, names)) => names.push(alias),
            None => self.aliases.push((field, vec![alias])),
        }
        self
    }

    pub fn aliases(&self, field: Field) -> &[String] {
        self.aliases
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, names)| names.as_slice())
            .unwrap_or(&[])
    }

    /// Resolve the mapping against a header row.
    ///
    /// Headers are compared after trimming. Fails only when a required field
    /// has no matching header; optional fields resolve to `None` with a warning.
    pub fn resolve<S: AsRef<str>>(&self, headers: &[S]) -> Result<ResolvedColumns, PipelineError> {
        let mut resolved = ResolvedColumns::default();

        for field in Field::ALL {
            let aliases = self.aliases(field);
            let position = aliases.iter().find_map(|alias| {
                headers
                    .iter()
                    .position(|h| h.as_ref().trim() == alias.as_str())
            });

            match position {
                Some(idx) => resolved.set(field, idx),
                None if field.is_required() => {
                    return Err(PipelineError::MissingColumn {
                        field: field.label().to_string(),
                        aliases: aliases.to_vec(),
                    });
                }
                None => {
                    log::warn!(
                        "Column for {} not found (accepted: {}); the field will be empty on every row",
                        field.label(),
                        aliases.join(", ")
                    );
                }
            }
        }

        Ok(resolved)
    }
}

/// Header positions of each field in a concrete file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub village: Option<usize>,
    pub measured_at: Option<usize>,
    pub age: Option<usize>,
    pub status: Option<usize>,
}

impl ResolvedColumns {
    fn set(&mut self, field: Field, idx: usize) {
        match field {
            Field::Village => self.village = Some(idx),
            Field::MeasuredAt => self.measured_at = Some(idx),
            Field::Age => self.age = Some(idx),
            Field::Status => self.status = Some(idx),
        }
    }

    pub fn get(&self, field: Field) -> Option<usize> {
        match field {
            Field::Village => self.village,
            Field::MeasuredAt => self.measured_at,
            Field::Age => self.age,
            Field::Status => self.status,
        }
    }
}
