pub mod ingest_readings;
