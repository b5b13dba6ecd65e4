//! Generates `schema.json`, the JSON schema of the store configuration file,
//! at build time.
