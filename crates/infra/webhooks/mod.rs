pub mod http_dispatcher;
