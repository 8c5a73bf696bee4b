#![allow(clippy::missing_errors_doc)]

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use gate_defence_core::{config::HordeDefinition, CellCoord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SNAPSHOT_DOMAIN: &str = "gate";
const SNAPSHOT_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded scenario payload.
const SNAPSHOT_HEADER: &str = "gate:v1";
/// Delimiter used to separate the prefix, grid dimensions and payload.
const FIELD_DELIMITER: char = ':';

/// Snapshot of a complete scenario: grid layout plus horde schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct ScenarioSnapshot {
    /// Number of grid columns.
    pub columns: u32,
    /// Number of grid rows.
    pub rows: u32,
    /// Length of a cell edge expressed in world units.
    pub cell_length: f32,
    /// Cells flagged as enemy spawn points.
    pub spawn_cells: Vec<CellCoord>,
    /// Cells flagged as pathfinding goals.
    pub goal_cells: Vec<CellCoord>,
    /// Cells blocked by obstacles.
    pub blocked_cells: Vec<CellCoord>,
    /// Horde schedule executed against the grid.
    pub hordes: Vec<HordeDefinition>,
}

impl ScenarioSnapshot {
    /// Encodes the scenario into a single-line string suitable for
    /// clipboard transfer.
    #[must_use]
    pub(crate) fn encode(&self) -> String {
        let payload = SerializableScenario {
            cell_length: self.cell_length,
            spawn_cells: self.spawn_cells.clone(),
            goal_cells: self.goal_cells.clone(),
            blocked_cells: self.blocked_cells.clone(),
            hordes: self.hordes.clone(),
        };
        let json = serde_json::to_vec(&payload).expect("scenario serialization never fails");
        let encoded = STANDARD_NO_PAD.encode(json);
        format!("{SNAPSHOT_HEADER}:{}x{}:{encoded}", self.columns, self.rows)
    }

    /// Decodes a scenario from the provided string representation.
    pub(crate) fn decode(value: &str) -> Result<Self, ScenarioTransferError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ScenarioTransferError::EmptyPayload);
        }

        let mut parts = trimmed.split(FIELD_DELIMITER);
        let domain = parts.next().ok_or(ScenarioTransferError::MissingPrefix)?;
        let version = parts.next().ok_or(ScenarioTransferError::MissingVersion)?;
        let dimensions = parts
            .next()
            .ok_or(ScenarioTransferError::MissingDimensions)?;
        let payload = parts.next().ok_or(ScenarioTransferError::MissingPayload)?;

        if domain != SNAPSHOT_DOMAIN {
            return Err(ScenarioTransferError::InvalidPrefix(domain.to_owned()));
        }
        if version != SNAPSHOT_VERSION {
            return Err(ScenarioTransferError::UnsupportedVersion(
                version.to_owned(),
            ));
        }

        let (columns, rows) = parse_dimensions(dimensions)?;
        let bytes = STANDARD_NO_PAD
            .decode(payload.as_bytes())
            .map_err(ScenarioTransferError::InvalidEncoding)?;
        let decoded: SerializableScenario =
            serde_json::from_slice(&bytes).map_err(ScenarioTransferError::InvalidPayload)?;

        Ok(Self {
            columns,
            rows,
            cell_length: decoded.cell_length,
            spawn_cells: decoded.spawn_cells,
            goal_cells: decoded.goal_cells,
            blocked_cells: decoded.blocked_cells,
            hordes: decoded.hordes,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct SerializableScenario {
    cell_length: f32,
    spawn_cells: Vec<CellCoord>,
    goal_cells: Vec<CellCoord>,
    blocked_cells: Vec<CellCoord>,
    hordes: Vec<HordeDefinition>,
}

/// Errors that can occur while decoding scenario transfer strings.
#[derive(Debug, Error)]
pub(crate) enum ScenarioTransferError {
    /// The provided string was empty or contained only whitespace.
    #[error("scenario payload was empty")]
    EmptyPayload,
    /// The prefix segment was missing from the encoded scenario.
    #[error("scenario string is missing the prefix")]
    MissingPrefix,
    /// The encoded scenario did not contain a version segment.
    #[error("scenario string is missing the version")]
    MissingVersion,
    /// The encoded scenario did not include grid dimensions.
    #[error("scenario string is missing the grid dimensions")]
    MissingDimensions,
    /// The encoded scenario did not include the payload segment.
    #[error("scenario string is missing the payload")]
    MissingPayload,
    /// The encoded scenario used an unexpected prefix segment.
    #[error("scenario prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The encoded scenario used an unsupported version identifier.
    #[error("scenario version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The grid dimensions could not be parsed from the encoded scenario.
    #[error("could not parse grid dimensions '{0}'")]
    InvalidDimensions(String),
    /// The base64 payload could not be decoded.
    #[error("could not decode scenario payload: {0}")]
    InvalidEncoding(#[source] base64::DecodeError),
    /// The decoded payload could not be deserialised.
    #[error("could not parse scenario payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), ScenarioTransferError> {
    let (columns, rows) = dimensions
        .split_once(['x', 'X'])
        .ok_or_else(|| ScenarioTransferError::InvalidDimensions(dimensions.to_owned()))?;

    let columns = columns
        .trim()
        .parse::<u32>()
        .map_err(|_| ScenarioTransferError::InvalidDimensions(dimensions.to_owned()))?;
    let rows = rows
        .trim()
        .parse::<u32>()
        .map_err(|_| ScenarioTransferError::InvalidDimensions(dimensions.to_owned()))?;

    if columns == 0 || rows == 0 {
        return Err(ScenarioTransferError::InvalidDimensions(
            dimensions.to_owned(),
        ));
    }

    Ok((columns, rows))
}
