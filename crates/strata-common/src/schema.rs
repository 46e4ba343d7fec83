//! Table schemas.

use crate::error::{Result, StrataError};
use crate::types::FieldType;
use serde::{Deserialize, Serialize};

/// One named, typed field of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub field_type: FieldType,
    pub name: String,
}

impl Field {
    pub fn new(field_type: FieldType, name: impl Into<String>) -> Self {
        Self {
            field_type,
            name: name.into(),
        }
    }
}

/// Ordered list of fields describing one table's tuple layout.
///
/// A schema always has at least one field and never changes after creation.
/// Deserialized schemas go through the same checks as [`Schema::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SchemaDef")]
pub struct Schema {
    fields: Vec<Field>,
}

#[derive(Deserialize)]
struct SchemaDef {
    fields: Vec<Field>,
}

impl TryFrom<SchemaDef> for Schema {
    type Error = StrataError;

    fn try_from(def: SchemaDef) -> Result<Self> {
        Schema::new(def.fields)
    }
}

impl Schema {
    /// Creates a schema from its fields.
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        if fields.is_empty() {
            return Err(StrataError::InvalidSchema(
                "schema must have at least one field".to_string(),
            ));
        }
        if let Some(field) = fields.iter().find(|f| f.field_type.size() == 0) {
            return Err(StrataError::InvalidSchema(format!(
                "field {:?} has zero width",
                field.name
            )));
        }
        let total = fields
            .iter()
            .try_fold(0usize, |acc, f| acc.checked_add(f.field_type.size()));
        if total.is_none() {
            return Err(StrataError::InvalidSchema(
                "tuple size overflows".to_string(),
            ));
        }
        Ok(Self { fields })
    }

    /// Creates a schema whose fields are named `f0`, `f1`, ...
    pub fn from_types(types: &[FieldType]) -> Result<Self> {
        Self::new(
            types
                .iter()
                .enumerate()
                .map(|(i, t)| Field::new(*t, format!("f{}", i)))
                .collect(),
        )
    }

    /// Concatenates two schemas, `left` fields first.
    pub fn merge(left: &Schema, right: &Schema) -> Result<Schema> {
        let mut fields = left.fields.clone();
        fields.extend(right.fields.iter().cloned());
        Schema::new(fields)
    }

    /// Returns the number of fields.
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Returns all fields in order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the field at `index`.
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Returns the type of the field at `index`.
    pub fn field_type(&self, index: usize) -> Option<FieldType> {
        self.fields.get(index).map(|f| f.field_type)
    }

    /// Returns the name of the field at `index`.
    pub fn field_name(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(|f| f.name.as_str())
    }

    /// Returns the index of the first field called `name`.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Size in bytes of one tuple with this schema. Cannot overflow, since
    /// construction rejects such schemas.
    pub fn tuple_size(&self) -> usize {
        self.fields.iter().map(|f| f.field_type.size()).sum()
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}({})", field.field_type, field.name)?;
        }
        Ok(())
    }
}
