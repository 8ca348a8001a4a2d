//! Property tests for reconciliation, filtering and price buckets

use proptest::prelude::*;
use std::sync::Arc;

use casa_ps::data::{PropertyRecord, RawValue, RecordBatch};
use casa_ps::models::FeatureValue;
use casa_ps::query::RecordFilter;
use casa_ps::reconcile::FeatureReconciler;
use casa_ps::schema::{FieldKind, SchemaRegistry};
use casa_ps::segment::price_buckets;

const DATASET: &str = "\
id,title,district,sq_mt_built,n_rooms,buy_price,has_lift,has_parking,has_pool,has_ac,has_storage_room,energy_certificate\n\
1,Piso,Centro,80,2,250000,True,False,False,False,False,E\n";

static DISTRICTS: [&str; 4] = ["Centro", "Retiro", "Salamanca", "Todos"];

fn reconciler() -> FeatureReconciler {
    let batch = RecordBatch::from_csv_reader(DATASET.as_bytes()).unwrap();
    FeatureReconciler::new(Arc::new(SchemaRegistry::from_dataset(batch).unwrap()))
}

fn raw_value() -> impl Strategy<Value = RawValue> {
    prop_oneof![
        Just(RawValue::Null),
        any::<bool>().prop_map(RawValue::Bool),
        any::<f64>().prop_map(RawValue::Number),
        prop_oneof![
            Just("true".to_string()),
            Just("false".to_string()),
            Just("nan".to_string()),
            Just("1.0".to_string()),
            Just(String::new()),
            "[a-zA-Z0-9 .-]{0,12}",
        ]
        .prop_map(RawValue::Text),
    ]
}

fn field_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("sq_mt_built".to_string()),
        Just("has_lift".to_string()),
        Just("has_pool".to_string()),
        Just("has_swimming_pool".to_string()),
        Just("has_parking_space".to_string()),
        Just("has_box_room".to_string()),
        Just("district".to_string()),
        Just("title".to_string()),
        Just("buy_price".to_string()),
        "[a-z_]{1,16}",
    ]
}

fn record() -> impl Strategy<Value = PropertyRecord> {
    prop::collection::vec((field_name(), raw_value()), 0..12).prop_map(|fields| {
        let mut record = PropertyRecord::new();
        for (name, value) in fields {
            record.insert(name, value);
        }
        record
    })
}

fn listing() -> impl Strategy<Value = RecordBatch> {
    let row = (
        prop::option::of(0.0f64..2_000_000.0),
        prop::sample::select(&DISTRICTS[..3]),
        prop::option::of(0i64..5),
    );
    prop::collection::vec(row, 0..40).prop_map(|rows| {
        let mut csv = String::from("id,buy_price,district,cluster\n");
        for (i, (price, district, cluster)) in rows.into_iter().enumerate() {
            let price = price.map(|p| p.to_string()).unwrap_or_default();
            let cluster = cluster.map(|c| c.to_string()).unwrap_or_default();
            csv.push_str(&format!("{},{},{},{}\n", i, price, district, cluster));
        }
        RecordBatch::from_csv_reader(csv.as_bytes()).unwrap()
    })
}

proptest! {
    #[test]
    fn canonical_row_matches_schema(record in record()) {
        let reconciler = reconciler();
        let row = reconciler.reconcile(&record);
        let schema = reconciler.registry().schema();

        prop_assert_eq!(row.len(), schema.len());
        for ((name, kind), value) in schema.columns().iter().zip(row.values()) {
            match kind {
                FieldKind::Numeric => prop_assert!(
                    matches!(value, FeatureValue::Number(v) if v.is_finite()),
                    "{} = {:?}", name, value
                ),
                FieldKind::BinaryFlag => prop_assert!(
                    *value == FeatureValue::Number(0.0) || *value == FeatureValue::Number(1.0),
                    "{} = {:?}", name, value
                ),
                FieldKind::Categorical => prop_assert!(
                    matches!(value, FeatureValue::Text(s) if !s.is_empty()),
                    "{} = {:?}", name, value
                ),
                FieldKind::Untyped => prop_assert!(
                    !matches!(value, FeatureValue::Number(v) if !v.is_finite()),
                    "{} = {:?}", name, value
                ),
            }
        }
    }

    #[test]
    fn reconciliation_is_deterministic(record in record()) {
        let reconciler = reconciler();
        prop_assert_eq!(reconciler.reconcile(&record), reconciler.reconcile(&record));
    }

    #[test]
    fn filtered_rows_satisfy_predicates(
        batch in listing(),
        min_price in prop::option::of(0.0f64..2_000_000.0),
        max_price in prop::option::of(0.0f64..2_000_000.0),
        district in prop::option::of(prop::sample::select(&DISTRICTS[..])),
        cluster in prop::option::of(0i64..5),
        limit in 0usize..50,
    ) {
        let filter = RecordFilter {
            min_price,
            max_price,
            district: district.map(str::to_string),
            cluster,
            ..Default::default()
        };
        let result = filter.apply(&batch, Some(limit)).unwrap();

        prop_assert!(result.len() <= limit);
        let mut last_id = -1;
        for i in 0..result.len() {
            let id = result.cell(i, "id").and_then(|c| c.as_i64()).unwrap();
            prop_assert!(id > last_id, "order not preserved");
            last_id = id;

            let price = result.cell(i, "buy_price").and_then(|c| c.as_f64());
            if let Some(min) = min_price {
                prop_assert!(price.is_some_and(|p| p >= min));
            }
            if let Some(max) = max_price {
                prop_assert!(price.is_some_and(|p| p <= max));
            }
            if let Some(d) = district.filter(|d| *d != "Todos") {
                prop_assert_eq!(result.cell(i, "district").and_then(|c| c.as_str()), Some(d));
            }
            if let Some(c) = cluster {
                prop_assert_eq!(result.cell(i, "cluster").and_then(|c| c.as_i64()), Some(c));
            }
        }
    }

    #[test]
    fn price_buckets_cover_priced_rows(prices in prop::collection::vec(prop::option::of(0.0f64..5_000_000.0), 0..60)) {
        let buckets = price_buckets(&prices);
        prop_assert_eq!(buckets.len(), prices.len());

        let priced: Vec<f64> = prices.iter().flatten().copied().collect();
        let min = priced.iter().copied().fold(f64::INFINITY, f64::min);
        let max = priced.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        for (price, bucket) in prices.iter().zip(&buckets) {
            match price {
                None => prop_assert_eq!(*bucket, None),
                Some(p) => {
                    let b = bucket.unwrap();
                    prop_assert!((0..5).contains(&b));
                    if min != max && *p == min {
                        prop_assert_eq!(b, 0);
                    }
                    if min != max && *p == max {
                        prop_assert_eq!(b, 4);
                    }
                }
            }
        }

        // buckets are monotone in price
        let mut pairs: Vec<(f64, i64)> = prices
            .iter()
            .zip(&buckets)
            .filter_map(|(p, b)| Some(((*p)?, (*b)?)))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        prop_assert!(pairs.windows(2).all(|w| w[0].1 <= w[1].1));
    }
}
