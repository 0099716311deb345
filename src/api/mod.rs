pub mod handlers;
pub mod middleware;
pub mod routes;

#[cfg(test)]
mod tests;
