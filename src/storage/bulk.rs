use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use log::info;
use mongodb::bson::{doc, Bson, Document};
use mongodb::Collection;
use serde::Serialize;

use crate::error::AgentError;
use crate::storage::mapping::DocumentMapper;

/// The datastore's error code for a unique-index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// A record that can live in a collection: serializable, with a stable
/// identifier stored as the document `_id`.
pub trait StoredDocument: Serialize {
    fn id(&self) -> &str;
}

/// What a bulk load did: which identifiers were inserted and which were
/// already present and therefore left untouched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    pub inserted: Vec<String>,
    pub existing: Vec<String>,
}

/// Inserts the candidates whose identifier is not already present in the
/// collection. Existing documents are never overwritten.
///
/// An empty batch returns immediately with no query and no write. Otherwise
/// the operation is two round trips: one bounded existence check over the
/// candidate identifier set, then one batched insert of the remainder.
/// There is no lock across the two, so a concurrent writer can win the race
/// for an identifier between them; the store's `_id` uniqueness then fails
/// the insert, surfaced as a write conflict and not retried here.
pub async fn insert_new_documents<T: StoredDocument>(
    collection: &Collection<Document>,
    mapper: &DocumentMapper,
    candidates: Vec<T>,
) -> Result<BulkOutcome, AgentError> {
    if candidates.is_empty() {
        return Ok(BulkOutcome::default());
    }

    let candidates = collapse_duplicates(candidates);

    let candidate_ids: Vec<Bson> = candidates
        .iter()
        .map(|candidate| Bson::String(candidate.id().to_string()))
        .collect();
    let existing: HashSet<String> = collection
        .distinct("_id", doc! { "_id": { "$in": candidate_ids } })
        .await
        .map_err(AgentError::Datastore)?
        .into_iter()
        .filter_map(|value| match value {
            Bson::String(id) => Some(id),
            _ => None,
        })
        .collect();

    let (missing, skipped) = split_existing(candidates, &existing);
    if missing.is_empty() {
        info!(
            "Bulk load: all {} candidate documents already present",
            skipped.len()
        );
        return Ok(BulkOutcome {
            inserted: Vec::new(),
            existing: skipped,
        });
    }

    let planned: Vec<String> = missing.iter().map(|doc| doc.id().to_string()).collect();
    let documents: Vec<Document> = missing
        .iter()
        .map(|doc| mapper.encode(doc))
        .collect::<Result<_, _>>()?;

    collection
        .insert_many(documents)
        .ordered(false)
        .await
        .map_err(|error| classify_insert_error(error, &planned))?;

    info!(
        "Bulk load: inserted {} new documents, left {} existing untouched",
        planned.len(),
        skipped.len()
    );

    Ok(BulkOutcome {
        inserted: planned,
        existing: skipped,
    })
}

/// Collapses batch-internal duplicates to one representative per
/// identifier. The last-seen payload wins; the first-seen position is kept
/// so the batch order stays deterministic.
fn collapse_duplicates<T: StoredDocument>(candidates: Vec<T>) -> Vec<T> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut collapsed: Vec<T> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        match positions.entry(candidate.id().to_string()) {
            Entry::Occupied(position) => collapsed[*position.get()] = candidate,
            Entry::Vacant(slot) => {
                slot.insert(collapsed.len());
                collapsed.push(candidate);
            }
        }
    }

    collapsed
}

/// Splits candidates into those absent from the collection and the
/// identifiers of those already present. Equality is exact string equality
/// on the identifier, no normalization.
fn split_existing<T: StoredDocument>(
    candidates: Vec<T>,
    existing: &HashSet<String>,
) -> (Vec<T>, Vec<String>) {
    let mut missing = Vec::with_capacity(candidates.len());
    let mut skipped = Vec::new();

    for candidate in candidates {
        if existing.contains(candidate.id()) {
            skipped.push(candidate.id().to_string());
        } else {
            missing.push(candidate);
        }
    }

    (missing, skipped)
}

fn classify_insert_error(error: mongodb::error::Error, planned: &[String]) -> AgentError {
    let ids = conflicting_ids(&error, planned);
    if ids.is_empty() {
        AgentError::Datastore(error)
    } else {
        AgentError::WriteConflict { ids, source: error }
    }
}

fn conflicting_ids(error: &mongodb::error::Error, planned: &[String]) -> Vec<String> {
    use mongodb::error::{ErrorKind, WriteFailure};

    match error.kind.as_ref() {
        ErrorKind::InsertMany(failure) => failure
            .write_errors
            .iter()
            .flatten()
            .filter(|write_error| write_error.code == DUPLICATE_KEY_CODE)
            .filter_map(|write_error| planned.get(write_error.index).cloned())
            .collect(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE =>
        {
            planned.to_vec()
        }
        _ => Vec::new(),
    }
}
