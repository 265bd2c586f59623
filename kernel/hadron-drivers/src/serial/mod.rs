pub mod serial_async;
