pub mod blue_current;
