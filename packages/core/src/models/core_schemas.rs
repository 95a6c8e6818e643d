//! Core Schema Definitions
//!
//! The entity set the archive ships with. Deployments may replace it with a
//! JSON registry (see [`SchemaRegistry::from_path`]), but these definitions
//! match the bundled database layout.
//!
//! ## Hierarchy
//!
//! ```text
//! projects ─┐
//! surveyors ─ surveys ─ survey_seasons ─ stations ─┬─ historic_visits ─ historic_captures
//!                                                  └─ modern_visits ─┬─ locations ─ modern_captures
//!                                                                    └─ modern_captures
//! ```
//!
//! Captures own `images`; stations, visits and surveyors own `metadata_files`.
//! `cameras`, `lens`, `participants` and `participant_groups` are plain rows.

use crate::models::schema::{
    Attribute, AttributeType, EntityKind, EntitySchema, Role, SchemaError,
};
use crate::models::{Relation, SchemaRegistry};
use AttributeType::*;

fn attrs(columns: &[(&str, AttributeType)]) -> Vec<Attribute> {
    columns
        .iter()
        .map(|(name, attribute_type)| Attribute::new(*name, *attribute_type))
        .collect()
}

fn node_entity(name: &str, columns: &[(&str, AttributeType)]) -> Result<EntitySchema, SchemaError> {
    EntitySchema::new(name, name, "id", EntityKind::Node, attrs(columns))
}

/// Build the bundled archive registry
pub fn archive_registry() -> Result<SchemaRegistry, SchemaError> {
    let mut images = attrs(&[
        ("id", Integer),
        ("image_state", Varchar),
        ("format", Varchar),
        ("x_dim", Integer),
        ("y_dim", Integer),
        ("bit_depth", Integer),
        ("remote", Boolean),
        ("comments", Text),
        ("lat", Numeric),
        ("long", Numeric),
        ("elev", Numeric),
        ("azimuth", Numeric),
        ("capture_datetime", Timestamp),
    ]);
    images.push(
        Attribute::new("secure_token", Varchar)
            .restricted_to(&[Role::Administrator, Role::SuperAdministrator]),
    );

    let mut stations = attrs(&[
        ("id", Integer),
        ("name", Varchar),
        ("lat", Numeric),
        ("long", Numeric),
        ("elev", Numeric),
        ("nts_sheet", Varchar),
    ]);
    stations.push(
        Attribute::new("published", Boolean).restricted_to(&[
            Role::Editor,
            Role::Administrator,
            Role::SuperAdministrator,
        ]),
    );

    let schemas = vec![
        node_entity("projects", &[("id", Integer), ("name", Varchar), ("description", Text)])?,
        node_entity(
            "surveyors",
            &[
                ("id", Integer),
                ("last_name", Varchar),
                ("given_names", Varchar),
                ("short_name", Varchar),
                ("affiliation", Varchar),
            ],
        )?,
        node_entity(
            "surveys",
            &[("id", Integer), ("name", Varchar), ("historical_map_sheet", Varchar)],
        )?,
        node_entity(
            "survey_seasons",
            &[
                ("id", Integer),
                ("year", Integer),
                ("geographic_coverage", Varchar),
                ("jurisdiction", Varchar),
                ("archive", Varchar),
                ("collection", Varchar),
                ("sources", Text),
                ("notes", Text),
            ],
        )?,
        EntitySchema::new("stations", "stations", "id", EntityKind::Node, stations)?,
        node_entity(
            "historic_visits",
            &[("id", Integer), ("date", Date), ("comments", Text)],
        )?,
        node_entity(
            "modern_visits",
            &[
                ("id", Integer),
                ("date", Date),
                ("start_time", Time),
                ("finish_time", Time),
                ("pilot", Varchar),
                ("rw_call_sign", Varchar),
                ("visit_narrative", Text),
                ("weather_narrative", Text),
                ("weather_temp", Float),
                ("weather_ws", Float),
                ("weather_gs", Float),
                ("weather_pressure", Float),
                ("weather_rh", Float),
            ],
        )?,
        node_entity(
            "locations",
            &[
                ("id", Integer),
                ("location_narrative", Text),
                ("location_identity", Varchar),
                ("lat", Numeric),
                ("long", Numeric),
                ("elev", Numeric),
                ("legacy_photos_start", Integer),
                ("legacy_photos_end", Integer),
            ],
        )?,
        node_entity(
            "historic_captures",
            &[
                ("id", Integer),
                ("plate_id", Varchar),
                ("fn_photo_reference", Varchar),
                ("f_stop", Float),
                ("shutter_speed", Varchar),
                ("focal_length", Integer),
                ("capture_datetime", Timestamp),
                ("cameras_id", Integer),
                ("lens_id", Integer),
                ("digitization_location", Varchar),
                ("digitization_datetime", Timestamp),
                ("lac_ecopy", Varchar),
                ("lac_wo", Varchar),
                ("lac_collection", Varchar),
                ("lac_box", Varchar),
                ("lac_catalogue", Varchar),
                ("condition", Varchar),
                ("comments", Text),
            ],
        )?,
        node_entity(
            "modern_captures",
            &[
                ("id", Integer),
                ("fn_photo_reference", Varchar),
                ("f_stop", Float),
                ("shutter_speed", Varchar),
                ("iso", Integer),
                ("focal_length", Integer),
                ("capture_datetime", Timestamp),
                ("cameras_id", Integer),
                ("lens_id", Integer),
                ("lat", Numeric),
                ("long", Numeric),
                ("elev", Numeric),
                ("azimuth", Numeric),
                ("alternate", Boolean),
                ("comments", Text),
            ],
        )?,
        EntitySchema::new("images", "images", "id", EntityKind::File, images)?,
        EntitySchema::new(
            "metadata_files",
            "metadata_files",
            "id",
            EntityKind::File,
            attrs(&[("id", Integer), ("type", Varchar)]),
        )?,
        EntitySchema::new(
            "cameras",
            "cameras",
            "id",
            EntityKind::Plain,
            attrs(&[
                ("id", Integer),
                ("make", Varchar),
                ("model", Varchar),
                ("unit", Varchar),
                ("format", Varchar),
            ]),
        )?,
        EntitySchema::new(
            "lens",
            "lens",
            "id",
            EntityKind::Plain,
            attrs(&[
                ("id", Integer),
                ("brand", Varchar),
                ("focal_length", Integer),
                ("max_aperture", Numeric),
            ]),
        )?,
        EntitySchema::new(
            "participants",
            "participants",
            "id",
            EntityKind::Plain,
            attrs(&[("id", Integer), ("last_name", Varchar), ("given_names", Varchar)]),
        )?,
        EntitySchema::new(
            "participant_groups",
            "participant_groups",
            "id",
            EntityKind::Plain,
            attrs(&[
                ("id", Integer),
                ("owner_id", Integer),
                ("participant_id", Integer),
                ("group_type", Varchar),
            ]),
        )?,
    ];

    SchemaRegistry::new(schemas)
}

/// Default `node_relations` rows for the bundled registry
pub fn archive_node_relations() -> Vec<Relation> {
    [
        ("projects", "stations"),
        ("surveyors", "surveys"),
        ("surveys", "survey_seasons"),
        ("survey_seasons", "stations"),
        ("stations", "historic_visits"),
        ("stations", "modern_visits"),
        ("historic_visits", "historic_captures"),
        ("surveyors", "historic_captures"),
        ("surveys", "historic_captures"),
        ("survey_seasons", "historic_captures"),
        ("modern_visits", "locations"),
        ("modern_visits", "modern_captures"),
        ("locations", "modern_captures"),
        ("stations", "modern_captures"),
    ]
    .into_iter()
    .map(|(owner, dependent)| Relation::new(owner, dependent))
    .collect()
}

/// Default `file_relations` rows for the bundled registry
pub fn archive_file_relations() -> Vec<Relation> {
    [
        ("historic_captures", "images"),
        ("modern_captures", "images"),
        ("locations", "images"),
        ("stations", "images"),
        ("stations", "metadata_files"),
        ("historic_visits", "metadata_files"),
        ("modern_visits", "metadata_files"),
        ("surveyors", "metadata_files"),
        ("surveys", "metadata_files"),
        ("survey_seasons", "metadata_files"),
    ]
    .into_iter()
    .map(|(owner, dependent)| Relation::new(owner, dependent))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_registry_is_valid() {
        let registry = archive_registry().unwrap();
        assert_eq!(registry.len(), 16);
        assert_eq!(registry.node_types().count(), 10);
        assert_eq!(
            registry.file_types().collect::<Vec<_>>(),
            vec!["images", "metadata_files"]
        );
    }

    #[test]
    fn test_relations_reference_registered_types() {
        let registry = archive_registry().unwrap();

        for relation in archive_node_relations() {
            let owner = registry.require(&relation.owner_type).unwrap();
            let dependent = registry.require(&relation.dependent_type).unwrap();
            assert_eq!(owner.kind(), EntityKind::Node, "{:?}", relation);
            assert_eq!(dependent.kind(), EntityKind::Node, "{:?}", relation);
        }

        for relation in archive_file_relations() {
            let owner = registry.require(&relation.owner_type).unwrap();
            let dependent = registry.require(&relation.dependent_type).unwrap();
            assert_eq!(owner.kind(), EntityKind::Node, "{:?}", relation);
            assert_eq!(dependent.kind(), EntityKind::File, "{:?}", relation);
        }
    }

    #[test]
    fn test_secure_token_is_admin_only() {
        let registry = archive_registry().unwrap();
        let images = registry.require("images").unwrap();
        let token = images.attribute("secure_token").unwrap();
        assert!(!token.is_visible_to(Role::Editor));
        assert!(token.is_visible_to(Role::Administrator));
    }
}
