pub mod beacon_deposit;
