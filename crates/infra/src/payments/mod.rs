pub mod epay_client;
