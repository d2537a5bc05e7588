//! Session module tests.

mod controller_test;
