pub mod error;

pub mod handlers {
    pub mod derivatives;
    pub mod health;
}

pub mod middleware {
    pub mod metrics;
    pub mod request_id;
}
