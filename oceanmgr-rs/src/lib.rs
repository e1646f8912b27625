pub mod db_oc;
pub mod dto_oc;
pub mod html_parse;
pub mod ocean;
pub mod ocean_web;
