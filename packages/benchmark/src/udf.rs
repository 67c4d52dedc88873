//! `DuckDB` scalar functions backed by the host geometry.
//!
//! Registering [`BoundaryPolygon::contains`] as a SQL function lets the
//! declarative engine filter rows with exactly the predicate the direct
//! engine uses, boundary policy included.

use duckdb::Connection;
use duckdb::core::{DataChunkHandle, LogicalTypeHandle, LogicalTypeId};
use duckdb::vscalar::{ScalarFunctionSignature, VScalar};
use duckdb::vtab::arrow::WritableVector;

use rural_registry_spatial::BoundaryPolygon;

/// `name(latitude DOUBLE, longitude DOUBLE) -> BOOLEAN`, true when the
/// point lies strictly inside the registered polygon.
struct PolygonContains;

impl VScalar for PolygonContains {
    type State = BoundaryPolygon;

    fn invoke(
        polygon: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let len = input.len();
        let lat_vector = input.flat_vector(0);
        let lon_vector = input.flat_vector(1);
        // SAFETY: both arguments are declared DOUBLE and hold `len` rows.
        let latitudes = unsafe { lat_vector.as_slice_with_len::<f64>(len) };
        let longitudes = unsafe { lon_vector.as_slice_with_len::<f64>(len) };

        let mut nulls = Vec::new();
        let mut out = output.flat_vector();
        {
            // SAFETY: the return type is BOOLEAN and only `len` rows are written.
            let results = unsafe { out.as_mut_slice_with_len::<bool>(len) };
            for (row, result) in results.iter_mut().enumerate() {
                let idx = u64::try_from(row)?;
                if lat_vector.row_is_null(idx) || lon_vector.row_is_null(idx) {
                    *result = false;
                    nulls.push(row);
                } else {
                    *result = polygon.contains(latitudes[row], longitudes[row]);
                }
            }
        }
        for row in nulls {
            out.set_null(row);
        }

        Ok(())
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![
                LogicalTypeHandle::from(LogicalTypeId::Double),
                LogicalTypeHandle::from(LogicalTypeId::Double),
            ],
            LogicalTypeHandle::from(LogicalTypeId::Boolean),
        )]
    }
}

/// Registers `name(latitude, longitude)` on `conn`, testing points against
/// a copy of `polygon`.
///
/// Function names live for the lifetime of the database, so each polygon
/// needs its own name.
///
/// # Errors
///
/// Returns [`duckdb::Error`] if `DuckDB` rejects the registration, for
/// example because `name` is already taken.
pub fn register_contains(
    conn: &Connection,
    name: &str,
    polygon: &BoundaryPolygon,
) -> Result<(), duckdb::Error> {
    conn.register_scalar_function_with_state::<PolygonContains>(name, polygon)?;
    log::debug!("Registered polygon function {name}");
    Ok(())
}
