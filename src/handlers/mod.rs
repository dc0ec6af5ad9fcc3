pub mod articles;
pub mod authors;
pub mod comments;
pub mod issues;
pub mod keywords;
pub mod users;
