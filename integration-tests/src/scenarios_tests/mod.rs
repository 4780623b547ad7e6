// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

mod postgres_store_tests;
