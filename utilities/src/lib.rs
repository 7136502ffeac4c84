pub mod hex_record;
