// Feature plumbing shared by training and inference: the ordered schema,
// frozen categorical codes, the fitted scaler and profile enrichment.

pub mod encoding;
pub mod profile;
pub mod scaler;
pub mod schema;
