pub mod bulletins;
