pub mod extracted_record;
pub mod search_kind;
pub mod search_request;
pub mod search_result;
pub mod site_profile;
