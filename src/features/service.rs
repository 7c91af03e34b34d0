//! Feature Builder: derive schemas from training data and encode records.
//!
//! Encoding is a pure function of `(record, schema)`; calling it twice with the
//! same inputs produces bit-identical vectors.

use std::collections::BTreeSet;

use ndarray::Array2;
use tracing::warn;

use crate::common::error::{RealtyError, RealtyResult};
use crate::data::domain::{Dataset, FieldKind, FieldValue, PropertyRecord};

use super::domain::{
    FeatureSchema, FeatureSpec, FeatureVector, Transform, UnseenCategory, UnseenCategoryPolicy,
};

/// Derive the feature schema from a labelled dataset.
///
/// Numeric fields are imputed with their training median, categorical fields
/// are one-hot encoded over the sorted set of observed categories. Declared
/// fields with no observed value in any row are left out.
pub fn derive_schema(dataset: &Dataset, policy: UnseenCategoryPolicy) -> RealtyResult<FeatureSchema> {
    if dataset.is_empty() {
        return Err(RealtyError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }

    let mut specs = Vec::new();
    for decl in &dataset.schema.fields {
        let transform = match decl.kind {
            FieldKind::Numeric => {
                let mut observed: Vec<f64> =
                    dataset.records.iter().filter_map(|r| r.number(&decl.name)).collect();
                if observed.is_empty() {
                    continue;
                }
                Transform::Numeric {
                    impute: median(&mut observed),
                }
            }
            FieldKind::Categorical => {
                let observed: BTreeSet<&str> =
                    dataset.records.iter().filter_map(|r| r.text(&decl.name)).collect();
                if observed.is_empty() {
                    continue;
                }
                Transform::OneHot {
                    categories: observed.into_iter().map(str::to_string).collect(),
                }
            }
        };
        specs.push(FeatureSpec {
            field: decl.name.clone(),
            required: decl.required,
            transform,
        });
    }

    if specs.is_empty() {
        return Err(RealtyError::schema(
            &dataset.schema.target,
            "no declared feature field carries any value",
        ));
    }
    Ok(FeatureSchema::new(specs, policy))
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Encode a record, logging any unseen categories that were bucketed.
pub fn build(record: &PropertyRecord, schema: &FeatureSchema) -> RealtyResult<FeatureVector> {
    let (vector, unseen) = build_reported(record, schema)?;
    for u in &unseen {
        warn!(field = %u.field, value = %u.value, "unseen category mapped to other bucket");
    }
    Ok(vector)
}

/// Encode a record and return the unseen-category reports alongside.
///
/// # Errors
///
/// `SchemaViolation` for a missing required field or a value of the wrong
/// kind; `UnseenCategory` only when the schema policy is `Reject`.
pub fn build_reported(
    record: &PropertyRecord,
    schema: &FeatureSchema,
) -> RealtyResult<(FeatureVector, Vec<UnseenCategory>)> {
    let mut values = Vec::with_capacity(schema.width());
    let mut unseen = Vec::new();

    for spec in &schema.specs {
        let value = record.get(&spec.field);
        match &spec.transform {
            Transform::Numeric { impute } => match value {
                FieldValue::Number(v) if v.is_finite() => values.push(*v),
                FieldValue::Number(v) => {
                    return Err(RealtyError::schema(&spec.field, format!("expected a finite number, got {v}")))
                }
                FieldValue::Missing if spec.required => {
                    return Err(RealtyError::schema(&spec.field, "required field is missing"))
                }
                FieldValue::Missing => values.push(*impute),
                FieldValue::Text(t) => {
                    return Err(RealtyError::schema(&spec.field, format!("expected a number, got text `{t}`")))
                }
            },
            Transform::OneHot { categories } => {
                let start = values.len();
                values.resize(start + categories.len() + 1, 0.0);
                match value {
                    FieldValue::Text(t) => match categories.binary_search(t) {
                        Ok(idx) => values[start + idx] = 1.0,
                        Err(_) => match schema.unseen_policy {
                            UnseenCategoryPolicy::Reject => {
                                return Err(RealtyError::UnseenCategory {
                                    field: spec.field.clone(),
                                    value: t.clone(),
                                })
                            }
                            UnseenCategoryPolicy::OtherBucket => {
                                values[start + categories.len()] = 1.0;
                                unseen.push(UnseenCategory {
                                    field: spec.field.clone(),
                                    value: t.clone(),
                                });
                            }
                        },
                    },
                    FieldValue::Missing if spec.required => {
                        return Err(RealtyError::schema(&spec.field, "required field is missing"))
                    }
                    // all zeros: no category at all
                    FieldValue::Missing => {}
                    FieldValue::Number(v) => {
                        return Err(RealtyError::schema(&spec.field, format!("expected a category, got number {v}")))
                    }
                }
            }
        }
    }

    Ok((FeatureVector::new(schema.fingerprint.clone(), values), unseen))
}

/// Encode every record, failing on the first invalid one.
pub fn build_matrix(records: &[PropertyRecord], schema: &FeatureSchema) -> RealtyResult<Vec<FeatureVector>> {
    records.iter().map(|r| build(r, schema)).collect()
}

/// Stack encoded vectors into a row-major `rows × width` design matrix.
pub fn stack(vectors: &[FeatureVector], width: usize) -> RealtyResult<Array2<f64>> {
    let values: Vec<f64> = vectors.iter().flat_map(|v| v.as_slice().iter().copied()).collect();
    Array2::from_shape_vec((vectors.len(), width), values)
        .map_err(|e| RealtyError::schema("features", format!("ragged feature matrix: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::domain::RecordSchema;
    use crate::data::service::from_records;
    use crate::features::domain::OTHER_BUCKET;

    fn dataset() -> Dataset {
        let rows = vec![
            (100.0, 2.0, 1.0, "B", 200_000.0),
            (140.0, 3.0, 2.0, "A", 320_000.0),
            (80.0, 2.0, 1.0, "C", 150_000.0),
            (120.0, 4.0, 2.0, "A", 290_000.0),
        ];
        let records = rows
            .into_iter()
            .map(|(area, beds, baths, hood, price)| {
                PropertyRecord::new()
                    .with("area", area)
                    .with("bedrooms", beds)
                    .with("bathrooms", baths)
                    .with("neighborhood", hood)
                    .with("price", price)
            })
            .collect();
        from_records(records, RecordSchema::property()).unwrap()
    }

    fn query(hood: &str) -> PropertyRecord {
        PropertyRecord::new()
            .with("area", 110.0)
            .with("bedrooms", 3.0)
            .with("bathrooms", 2.0)
            .with("neighborhood", hood)
    }

    #[test]
    fn derives_only_observed_fields() {
        let schema = derive_schema(&dataset(), UnseenCategoryPolicy::OtherBucket).unwrap();
        let fields: Vec<&str> = schema.specs.iter().map(|s| s.field.as_str()).collect();
        assert_eq!(fields, vec!["area", "bedrooms", "bathrooms", "neighborhood"]);
        assert_eq!(schema.specs[0].transform, Transform::Numeric { impute: 110.0 });
        assert_eq!(
            schema.specs[3].transform,
            Transform::OneHot {
                categories: vec!["A".into(), "B".into(), "C".into()]
            }
        );
        assert_eq!(schema.width(), 7);
    }

    #[test]
    fn build_is_deterministic() {
        let schema = derive_schema(&dataset(), UnseenCategoryPolicy::OtherBucket).unwrap();
        let a = build(&query("B"), &schema).unwrap();
        let b = build(&query("B"), &schema).unwrap();
        assert_eq!(a, b);
        let bits_a: Vec<u64> = a.values.iter().map(|v| v.to_bits()).collect();
        let bits_b: Vec<u64> = b.values.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
        assert_eq!(a.values, vec![110.0, 3.0, 2.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(a.schema, schema.fingerprint);
    }

    #[test]
    fn unseen_category_goes_to_other_bucket() {
        let schema = derive_schema(&dataset(), UnseenCategoryPolicy::OtherBucket).unwrap();
        let (vector, unseen) = build_reported(&query("Z"), &schema).unwrap();
        assert_eq!(&vector.values[3..], &[0.0, 0.0, 0.0, 1.0]);
        assert_eq!(
            unseen,
            vec![UnseenCategory {
                field: "neighborhood".into(),
                value: "Z".into()
            }]
        );
        assert_eq!(schema.feature_names()[6], format!("neighborhood={OTHER_BUCKET}"));
    }

    #[test]
    fn unseen_category_rejected_under_strict_policy() {
        let schema = derive_schema(&dataset(), UnseenCategoryPolicy::Reject).unwrap();
        assert!(matches!(
            build(&query("Z"), &schema),
            Err(RealtyError::UnseenCategory { .. })
        ));
    }

    #[test]
    fn missing_values_follow_requiredness() {
        let schema = derive_schema(&dataset(), UnseenCategoryPolicy::OtherBucket).unwrap();

        let mut record = query("A");
        record.remove("neighborhood");
        let vector = build(&record, &schema).unwrap();
        assert_eq!(&vector.values[3..], &[0.0, 0.0, 0.0, 0.0]);

        let mut record = query("A");
        record.remove("area");
        assert!(matches!(
            build(&record, &schema),
            Err(RealtyError::SchemaViolation { ref field, .. }) if field == "area"
        ));

        let record = query("A").with("bedrooms", "three");
        assert!(matches!(build(&record, &schema), Err(RealtyError::SchemaViolation { .. })));
    }

    #[test]
    fn optional_numeric_is_imputed() {
        let mut data = dataset();
        data.records[0].set("age", 10.0);
        data.records[1].set("age", 30.0);
        let schema = derive_schema(&data, UnseenCategoryPolicy::OtherBucket).unwrap();
        assert_eq!(schema.specs[3].field, "age");
        assert_eq!(schema.specs[3].transform, Transform::Numeric { impute: 20.0 });

        let vector = build(&query("A"), &schema).unwrap();
        assert_eq!(vector.values[3], 20.0);
    }

    #[test]
    fn build_matrix_encodes_all_rows() {
        let data = dataset();
        let schema = derive_schema(&data, UnseenCategoryPolicy::OtherBucket).unwrap();
        let rows = build_matrix(&data.records, &schema).unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.len() == schema.width()));

        let x = stack(&rows, schema.width()).unwrap();
        assert_eq!(x.dim(), (4, schema.width()));
        assert_eq!(x.row(2).to_vec(), rows[2].values);
    }

    #[test]
    fn stack_rejects_ragged_rows() {
        let rows = vec![
            FeatureVector::new("fs-1", vec![1.0, 2.0]),
            FeatureVector::new("fs-1", vec![3.0]),
        ];
        let err = stack(&rows, 2).unwrap_err();
        assert!(matches!(err, RealtyError::SchemaViolation { .. }));
    }
}
