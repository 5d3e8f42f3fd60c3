mod helpers;
mod names_tests;
