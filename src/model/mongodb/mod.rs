mod bson;
mod collection;
mod counter;
mod errors;
mod store;

pub use bson::{optional_datetime, u32_id_filter};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{
    ensure_counters_exist, Counter, CITIZEN_ID_COUNTER, CONSTITUENCY_ID_COUNTER,
    ELECTION_ID_COUNTER, PARTY_ID_COUNTER,
};
pub use errors::{is_duplicate_key_error, DUPLICATE_KEY};
pub use store::Store;
