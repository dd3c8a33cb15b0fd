pub mod bus_socket;
pub mod command_lister;
