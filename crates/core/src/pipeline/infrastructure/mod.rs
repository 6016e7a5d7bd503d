pub mod threaded_live_executor;
