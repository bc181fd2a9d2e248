pub(crate) mod gateways;
