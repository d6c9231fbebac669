mod export_integration;
mod load_and_prepare_integration;
mod providers_integration;
mod tick_windows_integration;
