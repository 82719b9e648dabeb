pub mod hmac_verifier;
