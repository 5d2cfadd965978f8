// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Built-in type tables: FHIRPath System types and FHIR primitive types

/// The FHIRPath System types
pub const SYSTEM_TYPES: &[&str] = &[
    "Boolean", "Integer", "Decimal", "String", "Date", "DateTime", "Time", "Quantity",
];

/// A FHIR primitive type and how it relates to the System types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FhirPrimitive {
    /// FHIR type name
    pub name: &'static str,
    /// System type that values of this type carry
    pub system_type: &'static str,
    /// FHIR primitive this type specializes
    pub base: Option<&'static str>,
}

const fn primitive(
    name: &'static str,
    system_type: &'static str,
    base: Option<&'static str>,
) -> FhirPrimitive {
    FhirPrimitive {
        name,
        system_type,
        base,
    }
}

/// FHIR primitive types
pub const FHIR_PRIMITIVES: &[FhirPrimitive] = &[
    primitive("boolean", "Boolean", None),
    primitive("integer", "Integer", None),
    primitive("positiveInt", "Integer", Some("integer")),
    primitive("unsignedInt", "Integer", Some("integer")),
    primitive("decimal", "Decimal", None),
    primitive("string", "String", None),
    primitive("code", "String", Some("string")),
    primitive("id", "String", Some("string")),
    primitive("markdown", "String", Some("string")),
    primitive("uri", "String", None),
    primitive("url", "String", Some("uri")),
    primitive("canonical", "String", Some("uri")),
    primitive("oid", "String", Some("uri")),
    primitive("uuid", "String", Some("uri")),
    primitive("base64Binary", "String", None),
    primitive("xhtml", "String", None),
    primitive("date", "Date", None),
    primitive("dateTime", "DateTime", None),
    primitive("instant", "DateTime", Some("dateTime")),
    primitive("time", "Time", None),
];

/// Check whether `name` is a System type
pub fn is_system_type(name: &str) -> bool {
    SYSTEM_TYPES.contains(&name)
}

/// Look up a FHIR primitive type
pub fn fhir_primitive(name: &str) -> Option<&'static FhirPrimitive> {
    FHIR_PRIMITIVES.iter().find(|p| p.name == name)
}

/// System type that values of a FHIR primitive type carry
pub fn system_type_for(fhir_type: &str) -> Option<&'static str> {
    fhir_primitive(fhir_type).map(|p| p.system_type)
}

/// Whether FHIR primitive `child` is `parent` or specializes it
pub fn is_primitive_subtype(child: &str, parent: &str) -> bool {
    let mut current = fhir_primitive(child);
    while let Some(p) = current {
        if p.name == parent {
            return true;
        }
        current = p.base.and_then(fhir_primitive);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_mapping() {
        assert_eq!(system_type_for("code"), Some("String"));
        assert_eq!(system_type_for("instant"), Some("DateTime"));
        assert_eq!(system_type_for("Patient"), None);
        assert!(is_system_type("Quantity"));
        assert!(!is_system_type("string"));
    }

    #[test]
    fn test_primitive_subtyping() {
        assert!(is_primitive_subtype("code", "string"));
        assert!(is_primitive_subtype("canonical", "uri"));
        assert!(is_primitive_subtype("positiveInt", "integer"));
        assert!(is_primitive_subtype("string", "string"));
        assert!(!is_primitive_subtype("string", "code"));
        assert!(!is_primitive_subtype("uri", "string"));
    }
}
